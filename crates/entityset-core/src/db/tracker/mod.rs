//! Per-entity tracking state shared by every collaborator.
//!
//! The tracker owns the identity map (key -> handle) and the lifecycle
//! state of each tracked entity. It never touches a store; collaborators
//! turn its [`ChangeSet`] into store writes and call [`ChangeTracker::accept`]
//! once those writes succeed.


use crate::{
    db::tracked::Tracked,
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
    traits::EntityKind,
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// TrackingError
///

#[derive(Debug, ThisError)]
pub enum TrackingError {
    #[error("entity '{entity}' with key {key} is already tracked")]
    AlreadyTracked { entity: &'static str, key: String },

    #[error("entity '{entity}' with key {key} is not tracked")]
    NotTracked { entity: &'static str, key: String },

    #[error("tracked entity '{entity}' is mutably borrowed")]
    Borrowed { entity: &'static str },

    #[error("primary key of tracked entity '{entity}' changed from {from} to {to}")]
    KeyChanged {
        entity: &'static str,
        from: String,
        to: String,
    },
}

impl TrackingError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyTracked { .. } => ErrorClass::Conflict,
            Self::NotTracked { .. } => ErrorClass::NotFound,
            Self::Borrowed { .. } | Self::KeyChanged { .. } => ErrorClass::InvariantViolation,
        }
    }

    fn already_tracked<E: EntityKind>(key: E::Key) -> Self {
        Self::AlreadyTracked {
            entity: E::PATH,
            key: format!("{key:?}"),
        }
    }

    const fn borrowed<E: EntityKind>() -> Self {
        Self::Borrowed { entity: E::PATH }
    }

    fn not_tracked<E: EntityKind>(key: E::Key) -> Self {
        Self::NotTracked {
            entity: E::PATH,
            key: format!("{key:?}"),
        }
    }
}

impl From<TrackingError> for InternalError {
    fn from(err: TrackingError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Tracker,
            message: err.to_string(),
            detail: Some(ErrorDetail::Tracking(err)),
        }
    }
}

///
/// EntityState
///
/// Observable tracking state of one entity.
/// `Modified` is derived by comparing the entity to its last accepted value.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityState {
    Added,
    Unchanged,
    Modified,
    Deleted,
}

impl EntityState {
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

// Stored lifecycle state; Modified is never stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EntryState {
    Added,
    Unchanged,
    Deleted,
}

///
/// TrackAs
/// Initial state for a newly tracked entity.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackAs {
    /// Pending insert (`add`).
    Added,

    /// Existing row (`attach`).
    Unchanged,
}

///
/// TrackedEntry
///

struct TrackedEntry<E: EntityKind> {
    handle: Tracked<E>,
    state: EntryState,
    original: Option<E>,
}

impl<E: EntityKind> TrackedEntry<E> {
    fn state(&self) -> EntityState {
        match self.state {
            EntryState::Added => EntityState::Added,
            EntryState::Deleted => EntityState::Deleted,
            EntryState::Unchanged => {
                let Some(original) = &self.original else {
                    return EntityState::Unchanged;
                };

                // an outstanding mutable borrow is an edit in progress
                match self.handle.try_borrow() {
                    Some(current) if *original == *current => EntityState::Unchanged,
                    _ => EntityState::Modified,
                }
            }
        }
    }
}

///
/// ChangeSet
///
/// Pending store writes derived from tracked state, in key order.
///

#[derive(Debug)]
pub struct ChangeSet<E: EntityKind> {
    pub inserts: Vec<(E::Key, E)>,
    pub updates: Vec<(E::Key, E)>,
    pub deletes: Vec<E::Key>,
}

impl<E: EntityKind> ChangeSet<E> {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

///
/// ChangeTracker
///

pub struct ChangeTracker<E: EntityKind> {
    entries: BTreeMap<E::Key, TrackedEntry<E>>,
}

impl<E: EntityKind> ChangeTracker<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ------------------------------------------------------------------
    // Lifecycle transitions
    // ------------------------------------------------------------------

    /// Track a new entity as pending-insert.
    pub fn add(&mut self, handle: Tracked<E>) -> Result<Tracked<E>, TrackingError> {
        self.insert_entry(handle, EntryState::Added, None)
    }

    /// Track an existing entity as unchanged.
    pub fn attach(&mut self, handle: Tracked<E>) -> Result<Tracked<E>, TrackingError> {
        let original = handle.try_get().ok_or_else(TrackingError::borrowed::<E>)?;

        self.insert_entry(handle, EntryState::Unchanged, Some(original))
    }

    /// Track an entity in the given initial state.
    pub fn track(
        &mut self,
        handle: Tracked<E>,
        mode: TrackAs,
    ) -> Result<Tracked<E>, TrackingError> {
        match mode {
            TrackAs::Added => self.add(handle),
            TrackAs::Unchanged => self.attach(handle),
        }
    }

    /// Mark a tracked entity for deletion.
    ///
    /// Removing a pending-insert entity cancels the insert and detaches it,
    /// returning `None`. Otherwise returns the new state.
    pub fn remove(&mut self, handle: &Tracked<E>) -> Result<Option<EntityState>, TrackingError> {
        let key = self.locate(handle)?;

        let Some(entry) = self.entries.get_mut(&key) else {
            return Err(TrackingError::not_tracked::<E>(key));
        };

        let state = entry.state;
        match state {
            EntryState::Added => {
                self.entries.remove(&key);

                Ok(None)
            }
            EntryState::Unchanged | EntryState::Deleted => {
                entry.state = EntryState::Deleted;

                Ok(Some(EntityState::Deleted))
            }
        }
    }

    /// Stop tracking an entity without any store effect.
    pub fn detach(&mut self, handle: &Tracked<E>) -> Result<(), TrackingError> {
        let key = self.locate(handle)?;
        self.entries.remove(&key);

        Ok(())
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Current state of a handle, or `None` when this tracker does not own it.
    #[must_use]
    pub fn state_of(&self, handle: &Tracked<E>) -> Option<EntityState> {
        let key = self.locate(handle).ok()?;

        self.entries.get(&key).map(TrackedEntry::state)
    }

    /// Tracked handle for a key, if any.
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Option<&Tracked<E>> {
        self.entries.get(key).map(|entry| &entry.handle)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entries.values().any(|entry| entry.state().is_pending())
    }

    // ------------------------------------------------------------------
    // Identity resolution
    // ------------------------------------------------------------------

    /// Map a loaded row onto its tracked handle.
    ///
    /// Rows whose key is already tracked resolve to the existing handle and the
    /// loaded value is discarded. Untracked rows get a fresh handle, tracked as
    /// unchanged only when `track` is set. A row whose key is held by a pending
    /// insert gets a fresh untracked handle carrying the committed value.
    pub fn resolve(&mut self, loaded: E, track: bool) -> Tracked<E> {
        let key = loaded.key();

        if let Some(entry) = self.entries.get(&key) {
            // a pending insert must not shadow the committed row
            if entry.state == EntryState::Added {
                return Tracked::new(loaded);
            }

            return entry.handle.clone();
        }

        let handle = Tracked::new(loaded);
        if track {
            self.entries.insert(
                key,
                TrackedEntry {
                    handle: handle.clone(),
                    state: EntryState::Unchanged,
                    original: Some(handle.get()),
                },
            );
        }

        handle
    }

    // ------------------------------------------------------------------
    // Commit support
    // ------------------------------------------------------------------

    /// Collect pending writes.
    ///
    /// Fails when a live entity's key no longer matches the key it was
    /// tracked under, or when a live entity is mutably borrowed.
    pub fn pending(&self) -> Result<ChangeSet<E>, TrackingError> {
        let mut changes = ChangeSet {
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        };

        for (key, entry) in &self.entries {
            if entry.state == EntryState::Deleted {
                changes.deletes.push(*key);
                continue;
            }

            let current = entry
                .handle
                .try_key()
                .ok_or_else(TrackingError::borrowed::<E>)?;
            if current != *key {
                return Err(TrackingError::KeyChanged {
                    entity: E::PATH,
                    from: format!("{key:?}"),
                    to: format!("{current:?}"),
                });
            }

            let target = match entry.state() {
                EntityState::Added => &mut changes.inserts,
                EntityState::Modified => &mut changes.updates,
                EntityState::Unchanged | EntityState::Deleted => continue,
            };
            let value = entry
                .handle
                .try_get()
                .ok_or_else(TrackingError::borrowed::<E>)?;
            target.push((*key, value));
        }

        Ok(changes)
    }

    /// Transition tracked state after the pending writes were persisted.
    pub fn accept(&mut self) {
        self.entries.retain(|_, entry| entry.state != EntryState::Deleted);

        for entry in self.entries.values_mut() {
            entry.state = EntryState::Unchanged;
            if let Some(value) = entry.handle.try_get() {
                entry.original = Some(value);
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn insert_entry(
        &mut self,
        handle: Tracked<E>,
        state: EntryState,
        original: Option<E>,
    ) -> Result<Tracked<E>, TrackingError> {
        let key = handle.try_key().ok_or_else(TrackingError::borrowed::<E>)?;

        if self.entries.contains_key(&key) || self.locate(&handle).is_ok() {
            return Err(TrackingError::already_tracked::<E>(key));
        }

        self.entries.insert(
            key,
            TrackedEntry {
                handle: handle.clone(),
                state,
                original,
            },
        );

        Ok(handle)
    }

    // Find the key a handle is tracked under; falls back to a scan when the
    // entity's key was edited after tracking.
    fn locate(&self, handle: &Tracked<E>) -> Result<E::Key, TrackingError> {
        let key = handle.try_key();

        if let Some(key) = key
            && let Some(entry) = self.entries.get(&key)
            && entry.handle.ptr_eq(handle)
        {
            return Ok(key);
        }

        if let Some((found, _)) = self
            .entries
            .iter()
            .find(|(_, entry)| entry.handle.ptr_eq(handle))
        {
            return Ok(*found);
        }

        Err(key.map_or_else(TrackingError::borrowed::<E>, TrackingError::not_tracked::<E>))
    }
}

impl<E: EntityKind> Default for ChangeTracker<E> {
    fn default() -> Self {
        Self::new()
    }
}
