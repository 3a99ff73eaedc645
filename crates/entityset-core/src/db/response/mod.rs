mod write;

pub use write::*;

use crate::{
    db::tracked::Tracked,
    error::{ErrorClass, ErrorOrigin, InternalError},
    traits::EntityKind,
};
use thiserror::Error as ThisError;

///
/// ResponseError
/// Errors related to interpreting a materialized response.
///

#[derive(Debug, ThisError)]
pub enum ResponseError {
    #[error("expected exactly one row, found 0 (entity {entity})")]
    NotFound { entity: &'static str },

    #[error("expected exactly one row, found {count} (entity {entity})")]
    NotUnique { entity: &'static str, count: u32 },
}

impl ResponseError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::NotUnique { .. } => ErrorClass::Conflict,
        }
    }
}

impl From<ResponseError> for InternalError {
    fn from(err: ResponseError) -> Self {
        Self::new(err.class(), ErrorOrigin::Response, err.to_string())
    }
}

/// Row count as `u32`; lengths past `u32::MAX` saturate instead of wrapping.
pub(crate) fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

///
/// Response
/// Materialized query result: tracked handles in pipeline order.
///

#[derive(Debug)]
pub struct Response<E: EntityKind>(Vec<Tracked<E>>);

impl<E: EntityKind> Response<E> {
    #[must_use]
    pub const fn new(rows: Vec<Tracked<E>>) -> Self {
        Self(rows)
    }

    //
    // Cardinality
    //

    /// Number of rows in the response, saturating at `u32::MAX`.
    #[must_use]
    pub fn count(&self) -> u32 {
        saturating_count(self.0.len())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    //
    // Exact cardinality helpers
    //

    /// Require exactly one row.
    pub fn one(self) -> Result<Tracked<E>, ResponseError> {
        match self.one_opt()? {
            Some(handle) => Ok(handle),
            None => Err(ResponseError::NotFound { entity: E::PATH }),
        }
    }

    /// Require at most one row.
    pub fn one_opt(self) -> Result<Option<Tracked<E>>, ResponseError> {
        let count = self.count();
        if count > 1 {
            return Err(ResponseError::NotUnique {
                entity: E::PATH,
                count,
            });
        }

        Ok(self.0.into_iter().next())
    }

    //
    // Rows
    //

    #[must_use]
    pub fn first(&self) -> Option<&Tracked<E>> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tracked<E>> {
        self.0.iter()
    }

    /// Clones of the current entity values, in order.
    #[must_use]
    pub fn entities(&self) -> Vec<E> {
        self.0.iter().map(Tracked::get).collect()
    }

    #[must_use]
    pub fn into_handles(self) -> Vec<Tracked<E>> {
        self.0
    }

    //
    // Keys
    //

    /// Collect all primary keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<E::Key> {
        self.0.iter().map(Tracked::key).collect()
    }

    #[must_use]
    pub fn contains_key(&self, key: &E::Key) -> bool {
        self.0.iter().any(|handle| handle.key() == *key)
    }

    /// True when both responses hold the same instances in the same order.
    #[must_use]
    pub fn same_identities(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.ptr_eq(b))
    }
}

impl<E: EntityKind> IntoIterator for Response<E> {
    type Item = Tracked<E>;
    type IntoIter = std::vec::IntoIter<Tracked<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, E: EntityKind> IntoIterator for &'a Response<E> {
    type Item = &'a Tracked<E>;
    type IntoIter = std::slice::Iter<'a, Tracked<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

///
/// TESTS
///
