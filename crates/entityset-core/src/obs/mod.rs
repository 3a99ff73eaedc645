//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not access stores or trackers directly.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EventOps, EventReport};
pub use sink::{
    ExecKind, MetricsEvent, MetricsSink, TrackKind, metrics_report, metrics_reset_all,
    with_metrics_sink,
};
