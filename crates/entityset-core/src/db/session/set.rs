use crate::{
    db::{
        query::Query,
        session::DbSession,
        set::EntitySet,
        tracked::Tracked,
        tracker::{EntityState, TrackAs},
    },
    error::InternalError,
    obs::sink::{self, MetricsEvent, TrackKind},
    traits::EntityKind,
};
use std::marker::PhantomData;

///
/// DbSet
///
/// Session-bound entity set for one entity type.
/// Every operation is delegated to the owning [`DbSession`].
///

pub struct DbSet<'s, E: EntityKind> {
    session: &'s DbSession,
    _marker: PhantomData<E>,
}

impl<'s, E: EntityKind> DbSet<'s, E> {
    pub(super) const fn new(session: &'s DbSession) -> Self {
        Self {
            session,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &'s DbSession {
        self.session
    }

    pub fn detach(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.session.detach(entity)
    }

    #[must_use]
    pub fn state_of(&self, entity: &Tracked<E>) -> Option<EntityState> {
        self.session.state_of(entity)
    }

    // Track a handle through the session tracker and report it.
    fn track(&self, mode: TrackAs, entity: Tracked<E>) -> Result<Tracked<E>, InternalError> {
        let session = self.session;

        session.with_metrics(|| -> Result<Tracked<E>, InternalError> {
            session.ensure_open()?;
            let handle = session.with_tracker::<E, _>(|tracker| tracker.track(entity, mode))??;

            let kind = match mode {
                TrackAs::Added => TrackKind::Add,
                TrackAs::Unchanged => TrackKind::Attach,
            };
            sink::record(MetricsEvent::Track {
                kind,
                entity_path: E::PATH,
            });
            if session.debug {
                tracing::debug!(entity = E::PATH, key = ?handle.try_key(), ?mode, "tracked");
            }

            Ok(handle)
        })
    }
}

impl<E: EntityKind> EntitySet<E> for DbSet<'_, E> {
    fn query(&self) -> Query<'_, E> {
        let session = self.session;

        Query::from_source(move |tracking| session.load_rows::<E>(tracking))
            .with_policy(session.read_policy)
            .with_tracking(session.tracking)
    }

    fn add(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError> {
        self.track(TrackAs::Added, entity.into())
    }

    fn attach(&self, entity: impl Into<Tracked<E>>) -> Result<Tracked<E>, InternalError> {
        self.track(TrackAs::Unchanged, entity.into())
    }

    fn remove(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        let session = self.session;

        session.with_metrics(|| -> Result<(), InternalError> {
            session.ensure_open()?;
            let outcome = session.with_tracker::<E, _>(|tracker| tracker.remove(entity))??;

            sink::record(MetricsEvent::Track {
                kind: TrackKind::Remove,
                entity_path: E::PATH,
            });
            if session.debug {
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

impl<E: EntityKind> Clone for DbSet<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityKind> Copy for DbSet<'_, E> {}
