//! Metrics sink boundary.
//!
//! Collaborators MUST NOT touch obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only bridge between entity set operations
//! and the global metrics state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<&'static dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Query,
    Commit,
}

///
/// TrackKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackKind {
    Add,
    Attach,
    Remove,
    Detach,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    ExecStart {
        kind: ExecKind,
        entity_path: &'static str,
    },
    ExecFinish {
        kind: ExecKind,
        entity_path: &'static str,
        rows_touched: u64,
        ok: bool,
    },
    Track {
        kind: TrackKind,
        entity_path: &'static str,
    },
    CommitRows {
        entity_path: &'static str,
        inserted: u64,
        updated: u64,
        deleted: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ExecStart { kind, entity_path } => {
                metrics::with_state_mut(|m| match kind {
                    ExecKind::Query => {
                        m.ops.query_calls = m.ops.query_calls.saturating_add(1);
                        let entry = m.entities.entry(entity_path.to_string()).or_default();
                        entry.query_calls = entry.query_calls.saturating_add(1);
                    }
                    ExecKind::Commit => {
                        m.ops.commit_calls = m.ops.commit_calls.saturating_add(1);
                    }
                });
            }

            MetricsEvent::ExecFinish {
                kind,
                entity_path,
                rows_touched,
                ok,
            } => {
                metrics::with_state_mut(|m| {
                    if !ok {
                        m.ops.exec_failures = m.ops.exec_failures.saturating_add(1);
                    }
                    if kind == ExecKind::Query {
                        m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows_touched);
                        let entry = m.entities.entry(entity_path.to_string()).or_default();
                        entry.rows_loaded = entry.rows_loaded.saturating_add(rows_touched);
                    }
                });
            }

            MetricsEvent::Track { kind, entity_path } => {
                metrics::with_state_mut(|m| {
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    match kind {
                        TrackKind::Add => {
                            m.ops.adds = m.ops.adds.saturating_add(1);
                            entry.adds = entry.adds.saturating_add(1);
                        }
                        TrackKind::Attach => {
                            m.ops.attaches = m.ops.attaches.saturating_add(1);
                            entry.attaches = entry.attaches.saturating_add(1);
                        }
                        TrackKind::Remove => {
                            m.ops.removes = m.ops.removes.saturating_add(1);
                            entry.removes = entry.removes.saturating_add(1);
                        }
                        TrackKind::Detach => {
                            m.ops.detaches = m.ops.detaches.saturating_add(1);
                            entry.detaches = entry.detaches.saturating_add(1);
                        }
                    }
                });
            }

            MetricsEvent::CommitRows {
                entity_path,
                inserted,
                updated,
                deleted,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_inserted = m.ops.rows_inserted.saturating_add(inserted);
                    m.ops.rows_updated = m.ops.rows_updated.saturating_add(updated);
                    m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(deleted);

                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.rows_inserted = entry.rows_inserted.saturating_add(inserted);
                    entry.rows_updated = entry.rows_updated.saturating_add(updated);
                    entry.rows_deleted = entry.rows_deleted.saturating_add(deleted);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    match SINK_OVERRIDE.with_borrow(|slot| *slot) {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous override is restored on every exit, including unwind.
pub fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<&'static dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with_borrow_mut(|slot| *slot = self.0);
        }
    }

    let prev = SINK_OVERRIDE.with_borrow_mut(|slot| slot.replace(sink));
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one execution.
/// A span dropped without `finish_ok` reports a failed execution.

pub(crate) struct Span {
    kind: ExecKind,
    entity_path: &'static str,
    rows: u64,
    ok: bool,
}

impl Span {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, entity_path: &'static str) -> Self {
        record(MetricsEvent::ExecStart { kind, entity_path });

        Self {
            kind,
            entity_path,
            rows: 0,
            ok: false,
        }
    }

    pub(crate) const fn finish_ok(&mut self, rows: u64) {
        self.rows = rows;
        self.ok = true;
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            entity_path: self.entity_path,
            rows_touched: self.rows,
            ok: self.ok,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        panic::{AssertUnwindSafe, catch_unwind},
    };

    struct CountingSink {
        calls: Cell<usize>,
        failures: Cell<usize>,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, event: MetricsEvent) {
            self.calls.set(self.calls.get() + 1);
            if matches!(event, MetricsEvent::ExecFinish { ok: false, .. }) {
                self.failures.set(self.failures.get() + 1);
            }
        }
    }

    fn leaked_sink() -> &'static CountingSink {
        Box::leak(Box::new(CountingSink {
            calls: Cell::new(0),
            failures: Cell::new(0),
        }))
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        let outer = leaked_sink();
        let inner = leaked_sink();
        let event = MetricsEvent::Track {
            kind: TrackKind::Add,
            entity_path: "test::Entity",
        };

        with_metrics_sink(outer, || {
            record(event);
            with_metrics_sink(inner, || record(event));
            record(event);
        });

        assert_eq!(outer.calls.get(), 2);
        assert_eq!(inner.calls.get(), 1);
        SINK_OVERRIDE.with_borrow(|slot| assert!(slot.is_none()));
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        let sink = leaked_sink();

        let result = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(sink, || panic!("boom"));
        }));

        assert!(result.is_err());
        SINK_OVERRIDE.with_borrow(|slot| assert!(slot.is_none()));
    }

    #[test]
    fn span_reports_failure_unless_finished() {
        let sink = leaked_sink();

        with_metrics_sink(sink, || {
            drop(Span::new(ExecKind::Query, "test::Entity"));

            let mut span = Span::new(ExecKind::Commit, "test::Entity");
            span.finish_ok(3);
        });

        assert_eq!(sink.calls.get(), 4);
        assert_eq!(sink.failures.get(), 1);
    }

    #[test]
    fn global_sink_accumulates_counters() {
        metrics_reset_all();

        record(MetricsEvent::Track {
            kind: TrackKind::Attach,
            entity_path: "test::Entity",
        });
        record(MetricsEvent::CommitRows {
            entity_path: "test::Entity",
            inserted: 2,
            updated: 1,
            deleted: 0,
        });

        let report = metrics_report();
        assert_eq!(report.ops.attaches, 1);
        assert_eq!(report.ops.rows_inserted, 2);
        assert_eq!(report.entities["test::Entity"].rows_updated, 1);

        metrics_reset_all();
        assert_eq!(metrics_report().ops.attaches, 0);
    }
}
