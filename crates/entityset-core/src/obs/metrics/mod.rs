use serde::Serialize;
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for entity set operations.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventOps {
    // Execution entrypoints
    pub query_calls: u64,
    pub commit_calls: u64,
    pub exec_failures: u64,

    // Lifecycle operations
    pub adds: u64,
    pub attaches: u64,
    pub removes: u64,
    pub detaches: u64,

    // Rows touched
    pub rows_loaded: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EntityCounters {
    pub query_calls: u64,
    pub adds: u64,
    pub attaches: u64,
    pub removes: u64,
    pub detaches: u64,
    pub rows_loaded: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
}

///
/// EventReport
/// Point-in-time copy of the counters.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
}

thread_local! {
    static STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    STATE.with_borrow_mut(f)
}

pub(crate) fn report() -> EventReport {
    STATE.with_borrow(|state| EventReport {
        ops: state.ops.clone(),
        entities: state.entities.clone(),
    })
}

pub(crate) fn reset_all() {
    STATE.with_borrow_mut(|state| *state = EventState::default());
}
