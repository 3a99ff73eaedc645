use crate::{db::query::Query, error::InternalError, traits::EntityKind};
use std::rc::Rc;

///
/// Projection
///
/// Lazy mapping of a query's entities to values.
/// Shares the underlying query's source, snapshot, and pipeline.
///

pub struct Projection<'a, E: EntityKind, R> {
    query: Query<'a, E>,
    map: Rc<dyn Fn(&E) -> R + 'a>,
}

impl<'a, E: EntityKind, R> Projection<'a, E, R> {
    pub(super) fn new(query: Query<'a, E>, map: impl Fn(&E) -> R + 'a) -> Self {
        Self {
            query,
            map: Rc::new(map),
        }
    }

    #[must_use]
    pub const fn query(&self) -> &Query<'a, E> {
        &self.query
    }

    pub fn execute(&self) -> Result<Vec<R>, InternalError> {
        let rows = self.query.run()?;

        Ok(rows
            .iter()
            .map(|handle| (self.map)(&*handle.borrow()))
            .collect())
    }

    pub fn first(&self) -> Result<Option<R>, InternalError> {
        let rows = self.query.run()?;

        Ok(rows.first().map(|handle| (self.map)(&*handle.borrow())))
    }

    pub fn count(&self) -> Result<u32, InternalError> {
        self.query.count()
    }
}

impl<E: EntityKind, R> Clone for Projection<'_, E, R> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            map: Rc::clone(&self.map),
        }
    }
}
