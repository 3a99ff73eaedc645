//! Module: db::query
//! Responsibility: deferred, composable query pipeline over an entity set.
//! Does not own: row loading, identity resolution, or store access.
//! Boundary: collaborators supply a source closure; this module only
//! composes operators and runs them when a terminal is called.

mod projection;

pub use projection::Projection;

use crate::{
    db::{
        response::{Response, saturating_count},
        tracked::Tracked,
    },
    error::InternalError,
    traits::EntityKind,
};
use serde::Deserialize;
use std::{cell::OnceCell, cmp::Ordering, iter::Sum, rc::Rc};

///
/// ReadPolicy
///
/// Re-enumeration policy for queries derived from one root.
///
/// - `Requery`: every terminal call runs the source again.
/// - `Snapshot`: the first terminal call materializes the source once and
///   every later terminal on the same root (or any query composed from it)
///   reuses that materialization.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    #[default]
    Requery,
    Snapshot,
}

///
/// QueryTracking
///
/// Whether enumeration starts tracking rows that are not tracked yet.
/// Rows that are already tracked always resolve to their tracked handle.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryTracking {
    #[default]
    Tracking,
    NoTracking,
}

impl QueryTracking {
    #[must_use]
    pub const fn is_tracking(self) -> bool {
        matches!(self, Self::Tracking)
    }
}

type Source<'a, E> = Rc<dyn Fn(QueryTracking) -> Result<Vec<Tracked<E>>, InternalError> + 'a>;
type Filter<'a, E> = Rc<dyn Fn(&E) -> bool + 'a>;
type Comparator<'a, E> = Rc<dyn Fn(&E, &E) -> Ordering + 'a>;

///
/// Stage
/// One operator in the pipeline, applied in declaration order.
///

enum Stage<'a, E> {
    Filter(Filter<'a, E>),
    Order(Vec<Comparator<'a, E>>),
    Skip(usize),
    Take(usize),
}

impl<E> Clone for Stage<'_, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Filter(f) => Self::Filter(Rc::clone(f)),
            Self::Order(cmps) => Self::Order(cmps.clone()),
            Self::Skip(n) => Self::Skip(*n),
            Self::Take(n) => Self::Take(*n),
        }
    }
}

///
/// Query
///
/// Lazy sequence of tracked entities.
///
/// Builders consume the query and return a new one; nothing touches the
/// collaborator until a terminal (`execute`, `count`, `first`, ...) runs.
/// Entities are borrowed while operators run, so a handle must not be held
/// mutably borrowed across a terminal call.
///

pub struct Query<'a, E: EntityKind> {
    source: Source<'a, E>,
    snapshot: Rc<OnceCell<Vec<Tracked<E>>>>,
    stages: Vec<Stage<'a, E>>,
    policy: ReadPolicy,
    tracking: QueryTracking,
}

impl<'a, E: EntityKind> Query<'a, E> {
    /// Build a query over a collaborator-supplied row source.
    ///
    /// The source must return committed rows, identity-resolved against the
    /// collaborator's tracker, in natural (key) order.
    pub fn from_source(
        source: impl Fn(QueryTracking) -> Result<Vec<Tracked<E>>, InternalError> + 'a,
    ) -> Self {
        Self {
            source: Rc::new(source),
            snapshot: Rc::new(OnceCell::new()),
            stages: Vec::new(),
            policy: ReadPolicy::default(),
            tracking: QueryTracking::default(),
        }
    }

    fn push(mut self, stage: Stage<'a, E>) -> Self {
        self.stages.push(stage);
        self
    }

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn policy(&self) -> ReadPolicy {
        self.policy
    }

    #[must_use]
    pub const fn tracking(&self) -> QueryTracking {
        self.tracking
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Change the tracking mode; the query no longer shares a snapshot
    /// with its root.
    #[must_use]
    pub fn with_tracking(mut self, tracking: QueryTracking) -> Self {
        if tracking != self.tracking {
            self.tracking = tracking;
            self.snapshot = Rc::new(OnceCell::new());
        }
        self
    }

    #[must_use]
    pub fn no_tracking(self) -> Self {
        self.with_tracking(QueryTracking::NoTracking)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    #[must_use]
    pub fn filter(self, predicate: impl Fn(&E) -> bool + 'a) -> Self {
        self.push(Stage::Filter(Rc::new(predicate)))
    }

    /// Restrict to the entity with this primary key.
    #[must_use]
    pub fn by_key(self, key: E::Key) -> Self {
        self.filter(move |entity| entity.key() == key)
    }

    /// Restrict to entities whose keys are listed.
    #[must_use]
    pub fn by_keys(self, keys: impl IntoIterator<Item = E::Key>) -> Self {
        let keys: Vec<E::Key> = keys.into_iter().collect();

        self.filter(move |entity| keys.contains(&entity.key()))
    }

    /// Start a new ordering, ascending by the extracted key.
    #[must_use]
    pub fn order_by<K: Ord>(self, key: impl Fn(&E) -> K + 'a) -> Self {
        self.push(Stage::Order(vec![ascending(key)]))
    }

    /// Start a new ordering, descending by the extracted key.
    #[must_use]
    pub fn order_by_desc<K: Ord>(self, key: impl Fn(&E) -> K + 'a) -> Self {
        self.push(Stage::Order(vec![descending(key)]))
    }

    /// Order by primary key.
    #[must_use]
    pub fn order_by_key(self) -> Self {
        self.order_by(E::key)
    }

    /// Break ties of the preceding ordering; behaves like `order_by`
    /// when no ordering precedes it.
    #[must_use]
    pub fn then_by<K: Ord>(self, key: impl Fn(&E) -> K + 'a) -> Self {
        self.then_with(ascending(key))
    }

    #[must_use]
    pub fn then_by_desc<K: Ord>(self, key: impl Fn(&E) -> K + 'a) -> Self {
        self.then_with(descending(key))
    }

    fn then_with(mut self, cmp: Comparator<'a, E>) -> Self {
        if let Some(Stage::Order(cmps)) = self.stages.last_mut() {
            cmps.push(cmp);
            self
        } else {
            self.push(Stage::Order(vec![cmp]))
        }
    }

    #[must_use]
    pub fn skip(self, count: usize) -> Self {
        self.push(Stage::Skip(count))
    }

    #[must_use]
    pub fn take(self, count: usize) -> Self {
        self.push(Stage::Take(count))
    }

    /// Project each entity; the projection stays lazy.
    #[must_use]
    pub fn select<R>(self, map: impl Fn(&E) -> R + 'a) -> Projection<'a, E, R> {
        Projection::new(self, map)
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    pub fn execute(&self) -> Result<Response<E>, InternalError> {
        self.run().map(Response::new)
    }

    /// Number of matching rows, saturating at `u32::MAX`.
    pub fn count(&self) -> Result<u32, InternalError> {
        self.run().map(|rows| saturating_count(rows.len()))
    }

    pub fn exists(&self) -> Result<bool, InternalError> {
        self.run().map(|rows| !rows.is_empty())
    }

    pub fn first(&self) -> Result<Option<Tracked<E>>, InternalError> {
        Ok(self.run()?.into_iter().next())
    }

    /// Tracked entity with this key among the query's results.
    pub fn find(&self, key: E::Key) -> Result<Option<Tracked<E>>, InternalError> {
        Ok(self.run()?.into_iter().find(|handle| handle.key() == key))
    }

    /// Entity with the smallest extracted key; the first one wins ties.
    pub fn min_by<K: Ord>(
        &self,
        key: impl Fn(&E) -> K,
    ) -> Result<Option<Tracked<E>>, InternalError> {
        let rows = self.run()?;

        Ok(rows
            .into_iter()
            .map(|handle| {
                let k = key(&*handle.borrow());
                (k, handle)
            })
            .reduce(|best, next| if next.0 < best.0 { next } else { best })
            .map(|(_, handle)| handle))
    }

    /// Entity with the largest extracted key; the first one wins ties.
    pub fn max_by<K: Ord>(
        &self,
        key: impl Fn(&E) -> K,
    ) -> Result<Option<Tracked<E>>, InternalError> {
        let rows = self.run()?;

        Ok(rows
            .into_iter()
            .map(|handle| {
                let k = key(&*handle.borrow());
                (k, handle)
            })
            .reduce(|best, next| if next.0 > best.0 { next } else { best })
            .map(|(_, handle)| handle))
    }

    pub fn sum_by<S: Sum<S>>(&self, value: impl Fn(&E) -> S) -> Result<S, InternalError> {
        let rows = self.run()?;

        Ok(rows.iter().map(|handle| value(&*handle.borrow())).sum())
    }

    pub fn fold<A>(&self, init: A, mut f: impl FnMut(A, &E) -> A) -> Result<A, InternalError> {
        let rows = self.run()?;

        Ok(rows
            .iter()
            .fold(init, |acc, handle| f(acc, &*handle.borrow())))
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn materialize(&self) -> Result<Vec<Tracked<E>>, InternalError> {
        match self.policy {
            ReadPolicy::Requery => (self.source)(self.tracking),
            ReadPolicy::Snapshot => {
                if let Some(rows) = self.snapshot.get() {
                    return Ok(rows.clone());
                }

                let rows = (self.source)(self.tracking)?;
                let _ = self.snapshot.set(rows.clone());

                Ok(rows)
            }
        }
    }

    pub(crate) fn run(&self) -> Result<Vec<Tracked<E>>, InternalError> {
        let mut rows = self.materialize()?;

        for stage in &self.stages {
            match stage {
                Stage::Filter(predicate) => rows.retain(|handle| predicate(&*handle.borrow())),
                Stage::Order(cmps) => rows.sort_by(|a, b| {
                    let (a, b) = (a.borrow(), b.borrow());

                    cmps.iter()
                        .map(|cmp| cmp(&*a, &*b))
                        .find(|ord| ord.is_ne())
                        .unwrap_or(Ordering::Equal)
                }),
                Stage::Skip(count) => {
                    let count = (*count).min(rows.len());
                    rows.drain(..count);
                }
                Stage::Take(count) => rows.truncate(*count),
            }
        }

        Ok(rows)
    }
}

impl<E: EntityKind> Clone for Query<'_, E> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
            snapshot: Rc::clone(&self.snapshot),
            stages: self.stages.clone(),
            policy: self.policy,
            tracking: self.tracking,
        }
    }
}

fn ascending<'a, E, K: Ord>(key: impl Fn(&E) -> K + 'a) -> Comparator<'a, E> {
    Rc::new(move |a, b| key(a).cmp(&key(b)))
}

fn descending<'a, E, K: Ord>(key: impl Fn(&E) -> K + 'a) -> Comparator<'a, E> {
    Rc::new(move |a, b| key(b).cmp(&key(a)))
}
