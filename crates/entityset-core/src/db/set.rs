use crate::{
    db::{query::Query, tracked::Tracked},
    error::InternalError,
    traits::EntityKind,
};

///
/// EntitySet
///
/// Queryable gateway over one logical collection of entities.
///
/// An entity set owns no entities and keeps no lifecycle state of its own:
/// queries, tracking, and persistence all belong to the collaborator behind
/// it (a `DbSession`, a `MemorySet`, or any other implementation). Errors
/// raised by that collaborator are returned unchanged.
///
/// ## Returned handles
/// `add` and `attach` return the collaborator's [`Tracked`] handle wrapping
/// exactly the value passed in; no copy or proxy is made. Queries yield the
/// same handle for that entity's key for as long as it stays tracked.
///

pub trait EntitySet<E: EntityKind> {
    /// Lazy query over the committed entities of this set.
    fn query(&self) -> Query<'_, E>;

    /// Track a new entity for insertion on the next commit.
    fn add(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError>;

    /// Track an existing entity without scheduling an insert.
    fn attach(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError>;

    /// Blank entity ready to be populated and added.
    fn create(&self) -> E {
        E::default()
    }

    /// Mark a tracked entity for deletion on the next commit.
    fn remove(&self, entity: &Tracked<E>) -> Result<(), InternalError>;
}
