//! ## Crate layout
//! - `core`: entity set contract, queries, tracking, collaborators, and
//!   observability.
//! - `error`: public error taxonomy for callers.
//!
//! The `prelude` module brings the entity set vocabulary into scope.

pub use entityset_core as core;

pub mod error;

pub use error::Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//
// Re-exports
//

pub use entityset_core::{
    config::SessionConfig,
    db::{
        CommitSummary, Db, DbSession, DbSet, EntitySet, EntityState, MemorySet, Projection, Query,
        QueryTracking, ReadPolicy, Response, Tracked,
    },
    obs::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink},
};

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        db::{DbSession, MemorySet, Query, Response, Tracked},
        traits::{EntityKey, EntityKind, Path},
    };
    pub use crate::{EntitySet as _, Error};
    pub use serde::{Deserialize, Serialize};
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use crate::{
        error::{ErrorKind, TrackingErrorKind},
        prelude::*,
    };

    #[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
    struct Tag {
        id: u16,
        label: String,
    }

    impl Path for Tag {
        const PATH: &'static str = "entityset::tests::Tag";
    }

    impl EntityKey for Tag {
        type Key = u16;
    }

    impl EntityKind for Tag {
        fn key(&self) -> Self::Key {
            self.id
        }
    }

    #[test]
    fn prelude_drives_an_entity_set() -> Result<(), Error> {
        let tags = MemorySet::<Tag>::new();
        tags.add(Tag {
            id: 1,
            label: "red".to_string(),
        })?;
        tags.commit()?;

        let labels = tags.query().select(|t| t.label.clone()).execute()?;
        assert_eq!(labels, vec!["red".to_string()]);

        Ok(())
    }

    #[test]
    fn internal_errors_convert_with_question_mark() {
        fn attach_twice(tags: &MemorySet<Tag>) -> Result<(), Error> {
            tags.attach(Tag::default())?;
            tags.attach(Tag::default())?;

            Ok(())
        }

        let err = attach_twice(&MemorySet::new()).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Tracking(TrackingErrorKind::AlreadyTracked)
        );
    }

    #[test]
    fn version_is_set() {
        assert!(!crate::VERSION.is_empty());
    }
}
