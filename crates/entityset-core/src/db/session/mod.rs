//! Module: db::session
//! Responsibility: store-backed collaborator: identity map, change
//! tracking, and commit for every entity type of one unit of work.
//! Does not own: query composition (db::query) or row encoding (db::store).

mod set;
mod slot;
#[cfg(test)]
mod tests;

pub use set::DbSet;

use crate::{
    config::SessionConfig,
    db::{
        query::{QueryTracking, ReadPolicy},
        response::CommitSummary,
        store::Db,
        tracked::Tracked,
        tracker::{ChangeTracker, EntityState},
    },
    error::InternalError,
    obs::sink::{self, ExecKind, MetricsEvent, MetricsSink, Span, TrackKind, with_metrics_sink},
    traits::EntityKind,
};
use slot::TrackerSlot;
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

/// Entity path reported by commit spans, which cover every store.
pub const COMMIT_SCOPE: &str = "*";

///
/// DbSession
///
/// One unit of work over a [`Db`]: owns the identity map and change
/// trackers, hands out [`DbSet`]s, and commits pending changes.
///
/// Single-threaded by construction; open one session per unit of work.
///

pub struct DbSession {
    db: Db,
    debug: bool,
    metrics: Option<&'static dyn MetricsSink>,
    read_policy: ReadPolicy,
    tracking: QueryTracking,
    trackers: RefCell<BTreeMap<&'static str, Box<dyn TrackerSlot>>>,
    open: Cell<bool>,
}

impl DbSession {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            debug: false,
            metrics: None,
            read_policy: ReadPolicy::default(),
            tracking: QueryTracking::default(),
            trackers: RefCell::new(BTreeMap::new()),
            open: Cell::new(true),
        }
    }

    /// Open a session with policy taken from a [`SessionConfig`].
    #[must_use]
    pub fn with_config(db: Db, config: &SessionConfig) -> Self {
        let session = Self::new(db)
            .read_policy(config.read_policy)
            .tracking(config.tracking);

        if config.debug {
            session.debug()
        } else {
            session
        }
    }

    // ---------------------------------------------------------------------
    // Policy
    // ---------------------------------------------------------------------

    /// Enable debug events for every operation of this session.
    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub const fn read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    #[must_use]
    pub const fn tracking(mut self, tracking: QueryTracking) -> Self {
        self.tracking = tracking;
        self
    }

    #[must_use]
    pub const fn db(&self) -> &Db {
        &self.db
    }

    // ---------------------------------------------------------------------
    // Entity sets
    // ---------------------------------------------------------------------

    #[must_use]
    pub const fn set<E: EntityKind>(&self) -> DbSet<'_, E> {
        DbSet::new(self)
    }

    // ---------------------------------------------------------------------
    // Tracking
    // ---------------------------------------------------------------------

    /// Stop tracking an entity; its row is left as is.
    pub fn detach<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.with_metrics(|| -> Result<(), InternalError> {
            self.ensure_open()?;
            self.with_tracker::<E, _>(|tracker| tracker.detach(entity))??;
            sink::record(MetricsEvent::Track {
                kind: TrackKind::Detach,
                entity_path: E::PATH,
            });
            if self.debug {
                tracing::debug!(entity = E::PATH, key = ?entity.try_key(), "detached");
            }

            Ok(())
        })
    }

    /// Tracking state of an entity in this session, if tracked.
    #[must_use]
    pub fn state_of<E: EntityKind>(&self, entity: &Tracked<E>) -> Option<EntityState> {
        self.with_tracker::<E, _>(|tracker| tracker.state_of(entity))
            .ok()
            .flatten()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.trackers
            .borrow()
            .values()
            .any(|slot| slot.has_changes())
    }

    /// Forget every tracked entity and pending change.
    pub fn discard_changes(&self) {
        let mut trackers = self.trackers.borrow_mut();
        for slot in trackers.values_mut() {
            slot.clear();
        }

        if self.debug {
            tracing::debug!(trackers = trackers.len(), "discarded tracked state");
        }
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    /// Persist every pending insert, update, and delete.
    ///
    /// All row ops across all entity types are checked before any is applied;
    /// on failure no store changes and tracked state is left untouched.
    pub fn commit(&self) -> Result<CommitSummary, InternalError> {
        self.with_metrics(|| -> Result<CommitSummary, InternalError> {
            let mut span = Span::new(ExecKind::Commit, COMMIT_SCOPE);
            self.ensure_open()?;

            let mut trackers = self.trackers.borrow_mut();
            let mut writes = Vec::new();
            let mut per_store = Vec::new();

            for slot in trackers.values() {
                let (write, summary) = slot.prepare()?;
                if !write.ops.is_empty() {
                    per_store.push((write.store, summary));
                    writes.push(write);
                }
            }

            if writes.is_empty() {
                span.finish_ok(0);
                if self.debug {
                    tracing::debug!("commit complete -> nothing to write");
                }

                return Ok(CommitSummary::default());
            }

            if self.debug {
                tracing::debug!(stores = writes.len(), "commit window opened");
            }

            if let Err(err) = self.db.with_data_mut(|reg| {
                reg.preflight(&writes)?;
                reg.apply(writes)
            }) {
                if self.debug {
                    tracing::debug!(error = %err, "commit rejected; nothing written");
                }

                return Err(err);
            }

            for slot in trackers.values_mut() {
                slot.accept();
            }

            let mut total = CommitSummary::default();
            for (store, summary) in per_store {
                sink::record(MetricsEvent::CommitRows {
                    entity_path: store,
                    inserted: summary.inserted,
                    updated: summary.updated,
                    deleted: summary.deleted,
                });
                total.merge(summary);
            }

            span.finish_ok(total.rows());
            if self.debug {
                tracing::debug!(
                    inserted = total.inserted,
                    updated = total.updated,
                    deleted = total.deleted,
                    "commit complete"
                );
            }

            Ok(total)
        })
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Close the session; every later operation fails as unavailable.
    pub fn close(&self) {
        if self.has_changes() {
            tracing::warn!("session closed with uncommitted changes");
        }

        self.open.set(false);
        self.trackers.borrow_mut().clear();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), InternalError> {
        if self.open.get() {
            Ok(())
        } else {
            Err(InternalError::session_unavailable("session is closed"))
        }
    }

    fn with_metrics<T>(&self, f: impl FnOnce() -> T) -> T {
        if let Some(sink) = self.metrics {
            with_metrics_sink(sink, f)
        } else {
            f()
        }
    }

    // Run a closure against the tracker for `E`, creating it on first use.
    fn with_tracker<E: EntityKind, R>(
        &self,
        f: impl FnOnce(&mut ChangeTracker<E>) -> R,
    ) -> Result<R, InternalError> {
        let mut trackers = self.trackers.borrow_mut();
        let slot = trackers
            .entry(E::PATH)
            .or_insert_with(|| Box::new(ChangeTracker::<E>::new()));

        let tracker = slot
            .as_any_mut()
            .downcast_mut::<ChangeTracker<E>>()
            .ok_or_else(|| {
                InternalError::session_invariant(format!(
                    "entity path '{}' is shared by more than one entity type",
                    E::PATH
                ))
            })?;

        Ok(f(tracker))
    }

    // Query source: committed rows, identity-resolved against the tracker.
    pub(crate) fn load_rows<E: EntityKind>(
        &self,
        tracking: QueryTracking,
    ) -> Result<Vec<Tracked<E>>, InternalError> {
        self.with_metrics(|| -> Result<Vec<Tracked<E>>, InternalError> {
            let mut span = Span::new(ExecKind::Query, E::PATH);
            self.ensure_open()?;

            let rows = self.db.load_all::<E>()?;
            let handles = self.with_tracker::<E, _>(|tracker| {
                rows.into_iter()
                    .map(|row| tracker.resolve(row, tracking.is_tracking()))
                    .collect::<Vec<_>>()
            })?;

            span.finish_ok(handles.len() as u64);
            if self.debug {
                tracing::debug!(entity = E::PATH, rows = handles.len(), ?tracking, "loaded");
            }

            Ok(handles)
        })
    }
}
