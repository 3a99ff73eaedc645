use crate::traits::EntityKind;
use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

///
/// Tracked
///
/// Shared handle to one entity instance.
///
/// Collaborators hand out the same handle from `add`/`attach` and from every
/// query that resolves the entity's key, so identity is handle identity
/// (`ptr_eq`), not value equality. Cloning the handle never copies the entity.
///

pub struct Tracked<E: EntityKind>(Rc<RefCell<E>>);

impl<E: EntityKind> Tracked<E> {
    /// Wrap an entity in a fresh, untracked handle.
    #[must_use]
    pub fn new(entity: E) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    /// Borrow the entity immutably.
    ///
    /// Panics if the entity is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, E> {
        self.0.borrow()
    }

    /// Borrow the entity mutably for in-place edits.
    ///
    /// Panics if the entity is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.0.borrow_mut()
    }

    /// Apply an in-place edit.
    pub fn update<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Current primary key of the entity.
    #[must_use]
    pub fn key(&self) -> E::Key {
        self.0.borrow().key()
    }

    /// Clone of the current entity value.
    #[must_use]
    pub fn get(&self) -> E {
        self.0.borrow().clone()
    }

    pub(crate) fn try_borrow(&self) -> Option<Ref<'_, E>> {
        self.0.try_borrow().ok()
    }

    /// Current primary key, or `None` while the entity is mutably borrowed.
    #[must_use]
    pub fn try_key(&self) -> Option<E::Key> {
        self.0.try_borrow().ok().map(|entity| entity.key())
    }

    /// Clone of the current value, or `None` while it is mutably borrowed.
    #[must_use]
    pub fn try_get(&self) -> Option<E> {
        self.0.try_borrow().ok().map(|entity| entity.clone())
    }

    /// True when both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<E: EntityKind> Clone for Tracked<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E: EntityKind> From<E> for Tracked<E> {
    fn from(entity: E) -> Self {
        Self::new(entity)
    }
}

impl<E: EntityKind> fmt::Debug for Tracked<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => f.debug_tuple("Tracked").field(&*entity).finish(),
            Err(_) => f.write_str("Tracked(<borrowed>)"),
        }
    }
}

///
/// TESTS
///
