//! Core runtime for entity sets: the [`EntitySet`](db::EntitySet) contract,
//! lazy queries, identity-preserving change tracking, and two collaborators
//! (a store-backed `DbSession` and an in-memory `MemorySet`).
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod obs;
pub mod serialize;
pub mod traits;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{EntitySet, Query, Response, Tracked},
        traits::{EntityKey, EntityKind, Path},
    };
}
