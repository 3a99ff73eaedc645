mod data;
mod row_op;

pub use data::*;
pub(crate) use row_op::*;

use crate::{
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
    traits::EntityKind,
};
use derive_more::{Deref, DerefMut};
use std::{cell::RefCell, collections::HashMap, rc::Rc};
use thiserror::Error as ThisError;

///
/// StoreError
///
/// Store-specific structured error detail.
/// Always wrapped in [`ErrorDetail::Store`] when surfaced.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("row not found in '{store}': {key}")]
    NotFound { store: &'static str, key: String },

    #[error("row already exists in '{store}': {key}")]
    AlreadyExists { store: &'static str, key: String },

    #[error("row exceeds max size: {len} bytes (limit {})", MAX_ROW_BYTES)]
    RowTooLarge { len: usize },
}

impl StoreError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::AlreadyExists { .. } => ErrorClass::Conflict,
            Self::RowTooLarge { .. } => ErrorClass::Unsupported,
        }
    }
}

impl From<StoreError> for InternalError {
    fn from(err: StoreError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Store,
            message: err.to_string(),
            detail: Some(ErrorDetail::Store(err)),
        }
    }
}

///
/// StoreRegistryError
///

#[derive(Debug, ThisError)]
pub enum StoreRegistryError {
    #[error("store '{0}' not found")]
    StoreNotFound(String),
}

impl From<StoreRegistryError> for InternalError {
    fn from(err: StoreRegistryError) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

///
/// StoreRegistry
/// Named data stores, one per entity path.
///

#[derive(Default, Deref, DerefMut)]
pub struct StoreRegistry(HashMap<&'static str, DataStore>);

impl StoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Register an empty store under a path; existing stores are kept.
    pub fn register(&mut self, path: &'static str) {
        self.0.entry(path).or_default();
    }

    pub fn try_get_store(&self, path: &str) -> Result<&DataStore, InternalError> {
        self.0
            .get(path)
            .ok_or_else(|| StoreRegistryError::StoreNotFound(path.to_string()).into())
    }

    pub fn try_get_store_mut(&mut self, path: &str) -> Result<&mut DataStore, InternalError> {
        self.0
            .get_mut(path)
            .ok_or_else(|| StoreRegistryError::StoreNotFound(path.to_string()).into())
    }
}

///
/// Db
///
/// Cloneable handle to a store registry.
///
/// Every clone shares the same stores, so several sessions opened over one
/// `Db` see each other's committed rows.
///

#[derive(Clone, Default)]
pub struct Db {
    registry: Rc<RefCell<StoreRegistry>>,
}

impl Db {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the store for an entity type.
    #[must_use]
    pub fn with_store<E: EntityKind>(self) -> Self {
        self.register::<E>();
        self
    }

    pub fn register<E: EntityKind>(&self) {
        self.registry.borrow_mut().register(E::PATH);
    }

    /// Run a closure with read access to the store registry.
    pub fn with_data<R>(&self, f: impl FnOnce(&StoreRegistry) -> R) -> R {
        f(&*self.registry.borrow())
    }

    /// Run a closure with write access to the store registry.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut StoreRegistry) -> R) -> R {
        f(&mut *self.registry.borrow_mut())
    }

    /// Decode every committed row of an entity type, in key order.
    pub fn load_all<E: EntityKind>(&self) -> Result<Vec<E>, InternalError> {
        self.with_data(|reg| reg.try_get_store(E::PATH)?.decode_all::<E>())
    }

    /// Insert rows directly, bypassing any session.
    pub fn seed<E: EntityKind>(
        &self,
        entities: impl IntoIterator<Item = E>,
    ) -> Result<(), InternalError> {
        self.with_data_mut(|reg| {
            let store = reg.try_get_store_mut(E::PATH)?;
            for entity in entities {
                store.put(&entity)?;
            }

            Ok(())
        })
    }

    /// Number of committed rows for an entity type.
    pub fn row_count<E: EntityKind>(&self) -> Result<usize, InternalError> {
        self.with_data(|reg| Ok(reg.try_get_store(E::PATH)?.len()))
    }
}

///
/// TESTS
///
