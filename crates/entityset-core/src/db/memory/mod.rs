//! Module: db::memory
//! Responsibility: self-contained entity set for tests and prototyping.
//! Rows live in an ordered map; tracking and commit semantics match
//! `DbSession` so code written against [`EntitySet`] behaves the same on both.

#[cfg(test)]
mod tests;

use crate::{
    config::SessionConfig,
    db::{
        query::{Query, QueryTracking, ReadPolicy},
        response::CommitSummary,
        set::EntitySet,
        store::StoreError,
        tracked::Tracked,
        tracker::{ChangeSet, ChangeTracker, EntityState, TrackAs},
    },
    error::InternalError,
    obs::sink::{self, ExecKind, MetricsEvent, MetricsSink, Span, TrackKind, with_metrics_sink},
    traits::EntityKind,
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

///
/// MemorySet
///
/// In-memory [`EntitySet`] for one entity type.
///
/// Committed rows are stored by value; queries see committed rows only, and
/// identity is preserved through the same tracker a session uses.
///

pub struct MemorySet<E: EntityKind> {
    rows: RefCell<BTreeMap<E::Key, E>>,
    tracker: RefCell<ChangeTracker<E>>,
    available: Cell<bool>,
    debug: bool,
    metrics: Option<&'static dyn MetricsSink>,
    read_policy: ReadPolicy,
    tracking: QueryTracking,
}

impl<E: EntityKind> MemorySet<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(BTreeMap::new()),
            tracker: RefCell::new(ChangeTracker::new()),
            available: Cell::new(true),
            debug: false,
            metrics: None,
            read_policy: ReadPolicy::default(),
            tracking: QueryTracking::default(),
        }
    }

    /// Start from committed rows; later rows replace earlier ones by key.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = E>) -> Self {
        let set = Self::new();
        set.rows
            .borrow_mut()
            .extend(rows.into_iter().map(|row| (row.key(), row)));

        set
    }

    #[must_use]
    pub fn with_config(config: &SessionConfig) -> Self {
        let set = Self::new()
            .read_policy(config.read_policy)
            .tracking(config.tracking);

        if config.debug { set.debug() } else { set }
    }

    // ---------------------------------------------------------------------
    // Policy
    // ---------------------------------------------------------------------

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

    /// Simulate an unreachable backing store.
    /// While unavailable every operation fails with an unavailable error.
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Committed rows, in key order.
    #[must_use]
    pub fn rows(&self) -> Vec<E> {
        self.rows.borrow().values().cloned().collect()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.borrow().len()
    }

    #[must_use]
    pub fn state_of(&self, entity: &Tracked<E>) -> Option<EntityState> {
        self.tracker.borrow().state_of(entity)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.tracker.borrow().has_changes()
    }

    // ---------------------------------------------------------------------
    // Tracking
    // ---------------------------------------------------------------------

    pub fn detach(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.with_metrics(|| -> Result<(), InternalError> {
            self.ensure_available()?;
            self.tracker.borrow_mut().detach(entity)?;

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

    /// Forget every tracked entity and pending change.
    pub fn discard_changes(&self) {
        self.tracker.borrow_mut().clear();
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    /// Apply pending changes to the committed rows.
    ///
    /// Every change is checked first; a rejected commit writes nothing.
    pub fn commit(&self) -> Result<CommitSummary, InternalError> {
        self.with_metrics(|| -> Result<CommitSummary, InternalError> {
            let mut span = Span::new(ExecKind::Commit, E::PATH);
            self.ensure_available()?;

            let mut tracker = self.tracker.borrow_mut();
            let changes = tracker.pending()?;
            let mut rows = self.rows.borrow_mut();

            if let Err(err) = Self::preflight(&rows, &changes) {
                if self.debug {
                    tracing::debug!(
                        entity = E::PATH,
                        error = %err,
                        "commit rejected; nothing written"
                    );
                }

                return Err(err.into());
            }

            let summary = CommitSummary {
                inserted: changes.inserts.len() as u64,
                updated: changes.updates.len() as u64,
                deleted: changes.deletes.len() as u64,
            };

            for (key, entity) in changes.inserts.into_iter().chain(changes.updates) {
                rows.insert(key, entity);
            }
            for key in &changes.deletes {
                rows.remove(key);
            }
            tracker.accept();

            if !summary.is_empty() {
                sink::record(MetricsEvent::CommitRows {
                    entity_path: E::PATH,
                    inserted: summary.inserted,
                    updated: summary.updated,
                    deleted: summary.deleted,
                });
            }

            span.finish_ok(summary.rows());
            if self.debug {
                tracing::debug!(
                    entity = E::PATH,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    "commit complete"
                );
            }

            Ok(summary)
        })
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn preflight(rows: &BTreeMap<E::Key, E>, changes: &ChangeSet<E>) -> Result<(), StoreError> {
        if let Some((key, _)) = changes.inserts.iter().find(|(key, _)| rows.contains_key(key)) {
            return Err(StoreError::AlreadyExists {
                store: E::PATH,
                key: format!("{key:?}"),
            });
        }

        let missing = changes
            .updates
            .iter()
            .map(|(key, _)| key)
            .chain(&changes.deletes)
            .find(|key| !rows.contains_key(key));

        match missing {
            Some(key) => Err(StoreError::NotFound {
                store: E::PATH,
                key: format!("{key:?}"),
            }),
            None => Ok(()),
        }
    }

    fn ensure_available(&self) -> Result<(), InternalError> {
        if self.available.get() {
            Ok(())
        } else {
            Err(InternalError::store_unavailable(format!(
                "memory set '{}' is unavailable",
                E::PATH
            )))
        }
    }

    fn with_metrics<T>(&self, f: impl FnOnce() -> T) -> T {
        if let Some(sink) = self.metrics {
            with_metrics_sink(sink, f)
        } else {
            f()
        }
    }

    fn load_rows(&self, tracking: QueryTracking) -> Result<Vec<Tracked<E>>, InternalError> {
        self.with_metrics(|| -> Result<Vec<Tracked<E>>, InternalError> {
            let mut span = Span::new(ExecKind::Query, E::PATH);
            self.ensure_available()?;

            let rows = self.rows();
            let mut tracker = self.tracker.borrow_mut();
            let handles = rows
                .into_iter()
                .map(|row| tracker.resolve(row, tracking.is_tracking()))
                .collect::<Vec<_>>();

            span.finish_ok(handles.len() as u64);
            if self.debug {
                tracing::debug!(entity = E::PATH, rows = handles.len(), ?tracking, "loaded");
            }

            Ok(handles)
        })
    }

    fn track(&self, mode: TrackAs, entity: Tracked<E>) -> Result<Tracked<E>, InternalError> {
        self.with_metrics(|| -> Result<Tracked<E>, InternalError> {
            self.ensure_available()?;
            let handle = self.tracker.borrow_mut().track(entity, mode)?;

            let kind = match mode {
                TrackAs::Added => TrackKind::Add,
                TrackAs::Unchanged => TrackKind::Attach,
            };
            sink::record(MetricsEvent::Track {
                kind,
                entity_path: E::PATH,
            });
            if self.debug {
                tracing::debug!(entity = E::PATH, key = ?handle.try_key(), ?mode, "tracked");
            }

            Ok(handle)
        })
    }
}

impl<E: EntityKind> Default for MemorySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityKind> EntitySet<E> for MemorySet<E> {
    fn query(&self) -> Query<'_, E> {
        Query::from_source(move |tracking| self.load_rows(tracking))
            .with_policy(self.read_policy)
            .with_tracking(self.tracking)
    }

    fn add(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError> {
        self.track(TrackAs::Added, entity.into())
    }

    fn attach(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError> {
        self.track(TrackAs::Unchanged, entity.into())
    }

    fn remove(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.with_metrics(|| -> Result<(), InternalError> {
            self.ensure_available()?;
            let outcome = self.tracker.borrow_mut().remove(entity)?;

            sink::record(MetricsEvent::Track {
                kind: TrackKind::Remove,
                entity_path: E::PATH,
            });
            if self.debug {
                let key = entity.try_key();
                match outcome {
                    Some(_) => tracing::debug!(entity = E::PATH, ?key, "marked deleted"),
                    None => tracing::debug!(entity = E::PATH, ?key, "pending insert cancelled"),
                }
            }

            Ok(())
        })
    }
}
