use derive_more::Display;
use entityset_core::{
    db::{ResponseError, StoreError, TrackingError},
    error::{ErrorClass, ErrorDetail, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        matches!(self.kind, ErrorKind::Tracking(_))
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let origin = err.origin.into();

        let kind = match &err.detail {
            Some(ErrorDetail::Tracking(detail)) => ErrorKind::Tracking(detail.into()),
            Some(ErrorDetail::Store(detail)) => ErrorKind::Store(detail.into()),
            None => match (err.class, err.origin) {
                (ErrorClass::Unavailable, _) => ErrorKind::Store(StoreErrorKind::Unavailable),
                (ErrorClass::Corruption, _) => ErrorKind::Store(StoreErrorKind::Corrupt),
                (ErrorClass::NotFound, CoreErrorOrigin::Response) => {
                    ErrorKind::Query(QueryErrorKind::NotFound)
                }
                (ErrorClass::Conflict, CoreErrorOrigin::Response) => {
                    ErrorKind::Query(QueryErrorKind::NotUnique)
                }
                (_, CoreErrorOrigin::Config) => ErrorKind::Config,
                _ => ErrorKind::Internal,
            },
        };

        Self::new(kind, origin, err.message)
    }
}

impl From<ResponseError> for Error {
    fn from(err: ResponseError) -> Self {
        let kind = match err {
            ResponseError::NotFound { .. } => QueryErrorKind::NotFound,
            ResponseError::NotUnique { .. } => QueryErrorKind::NotUnique,
        };

        Self::new(ErrorKind::Query(kind), ErrorOrigin::Response, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Tracking(TrackingErrorKind),
    Store(StoreErrorKind),
    Query(QueryErrorKind),

    /// Session configuration could not be loaded.
    Config,

    /// The caller cannot remediate this.
    Internal,
}

///
/// TrackingErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TrackingErrorKind {
    /// An entity with the same key is already tracked.
    AlreadyTracked,

    /// The entity is not tracked by this collaborator.
    NotTracked,

    /// A tracked entity's primary key was edited.
    KeyChanged,

    /// A tracked entity was mutably borrowed while the tracker read it.
    Borrowed,
}

impl From<&TrackingError> for TrackingErrorKind {
    fn from(err: &TrackingError) -> Self {
        match err {
            TrackingError::AlreadyTracked { .. } => Self::AlreadyTracked,
            TrackingError::NotTracked { .. } => Self::NotTracked,
            TrackingError::KeyChanged { .. } => Self::KeyChanged,
            TrackingError::Borrowed { .. } => Self::Borrowed,
        }
    }
}

///
/// StoreErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StoreErrorKind {
    NotFound,
    AlreadyExists,
    RowTooLarge,
    Corrupt,
    Unavailable,
}

impl From<&StoreError> for StoreErrorKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound,
            StoreError::AlreadyExists { .. } => Self::AlreadyExists,
            StoreError::RowTooLarge { .. } => Self::RowTooLarge,
        }
    }
}

///
/// QueryErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryErrorKind {
    /// Valid query, but no rows matched.
    NotFound,

    /// Query expected one row but matched many.
    NotUnique,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Tracker,
    Store,
    Session,
    Query,
    Response,
    Serialize,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Tracker => Self::Tracker,
            CoreErrorOrigin::Store => Self::Store,
            CoreErrorOrigin::Session => Self::Session,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Response => Self::Response,
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}

///
/// TESTS
///
