//! Entity sets and the collaborators behind them.
//!
//! - `set`: the [`EntitySet`] contract.
//! - `query` / `response`: lazy composable queries and their results.
//! - `tracked` / `tracker`: identity handles and change tracking.
//! - `session`: store-backed collaborator over a [`Db`].
//! - `memory`: in-memory collaborator for tests.
//! - `store`: encoded row storage.

pub mod memory;
pub mod query;
pub mod response;
pub mod session;
pub mod set;
pub mod store;
pub mod tracked;
pub mod tracker;

// re-exports
pub use memory::MemorySet;
pub use query::{Projection, Query, QueryTracking, ReadPolicy};
pub use response::{CommitSummary, Response, ResponseError};
pub use session::{DbSession, DbSet};
pub use set::EntitySet;
pub use store::{Db, StoreError};
pub use tracked::Tracked;
pub use tracker::{EntityState, TrackAs, TrackingError};
