use super::*;
use crate::{
    db::{set::EntitySet, store::StoreError},
    error::{ErrorClass, ErrorDetail, ErrorOrigin},
    obs::sink::MetricsEvent,
    test_support::{Gadget, Widget, widgets},
    traits::Path,
};

fn seeded_db() -> Db {
    let db = Db::new().with_store::<Widget>().with_store::<Gadget>();
    db.seed(widgets()).unwrap();

    db
}

fn ids(session: &DbSession) -> Vec<u64> {
    session
        .set::<Widget>()
        .query()
        .execute()
        .unwrap()
        .keys()
}

#[test]
fn added_entity_appears_after_commit() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    let handle = set.add(Widget::new(9, "rivet")).unwrap();
    assert!(!set.query().by_key(9).exists().unwrap());

    let summary = session.commit().unwrap();
    assert_eq!(summary.inserted, 1);

    let found = set.query().find(9).unwrap().unwrap();
    assert!(found.ptr_eq(&handle));
    assert_eq!(set.state_of(&handle), Some(EntityState::Unchanged));
}

#[test]
fn attached_then_removed_entity_disappears_after_commit() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    let handle = set.attach(Widget::new(2, "nut").with_qty(15)).unwrap();
    set.remove(&handle).unwrap();

    // pending deletes stay visible until commit
    assert!(set.query().by_key(2).exists().unwrap());

    session.commit().unwrap();

    assert_eq!(ids(&session), vec![1, 3, 4, 5]);
    assert_eq!(set.state_of(&handle), None);
}

#[test]
fn second_attach_of_same_key_conflicts() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    set.attach(Widget::new(1, "bolt")).unwrap();
    let err = set.attach(Widget::new(1, "bolt")).unwrap_err();

    assert!(err.is_already_tracked());
    assert_eq!(err.class, ErrorClass::Conflict);
    assert_eq!(err.origin, ErrorOrigin::Tracker);
}

#[test]
fn attach_after_query_conflicts_with_auto_tracked_row() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    set.query().execute().unwrap();

    assert!(set.attach(Widget::new(3, "washer")).unwrap_err().is_already_tracked());
}

#[test]
fn attached_instance_is_returned_by_query() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    let attached = set.attach(Widget::new(5, "spring").with_qty(9)).unwrap();
    let queried = set.query().filter(|w| w.id == 5).execute().unwrap().one().unwrap();

    assert!(queried.ptr_eq(&attached));
}

#[test]
fn create_yields_defaults_and_counts_once_committed() {
    let db = Db::new().with_store::<Widget>();
    let session = DbSession::new(db);
    let set = session.set::<Widget>();

    let blank = set.create();
    assert_eq!(blank, Widget::default());

    set.add(blank).unwrap();
    assert_eq!(set.query().count().unwrap(), 0);

    session.commit().unwrap();
    assert_eq!(set.query().count().unwrap(), 1);
}

#[test]
fn removing_untracked_entity_fails_not_tracked() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();

    let err = set.remove(&Tracked::new(Widget::new(4, "gear"))).unwrap_err();

    assert!(err.is_not_tracked());
    assert_eq!(err.class, ErrorClass::NotFound);
}

#[test]
fn re_enumeration_yields_same_identities() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();
    let query = set.query().order_by_desc(|w| w.qty);

    let first = query.execute().unwrap();
    let second = query.execute().unwrap();

    assert!(first.same_identities(&second));
}

#[test]
fn edits_to_tracked_entities_commit_as_updates() {
    let db = seeded_db();
    let session = DbSession::new(db.clone());
    let set = session.set::<Widget>();

    let gear = set.query().find(4).unwrap().unwrap();
    gear.update(|w| w.qty = 20);
    assert_eq!(set.state_of(&gear), Some(EntityState::Modified));
    assert!(session.has_changes());

    let summary = session.commit().unwrap();
    assert_eq!(summary, CommitSummary { inserted: 0, updated: 1, deleted: 0 });

    let other = DbSession::new(db);
    let reloaded = other.set::<Widget>().query().find(4).unwrap().unwrap();
    assert_eq!(reloaded.get().qty, 20);
}

#[test]
fn commit_is_atomic_across_entity_types() {
    let db = seeded_db();
    let session = DbSession::new(db.clone());

    session.set::<Gadget>().add(Gadget::new(1, "lever")).unwrap();
    // row 2 exists already, so this insert must fail preflight
    session.set::<Widget>().add(Widget::new(2, "dup")).unwrap();

    let err = session.commit().unwrap_err();

    assert_eq!(err.class, ErrorClass::Conflict);
    assert!(matches!(
        err.detail,
        Some(ErrorDetail::Store(StoreError::AlreadyExists { .. }))
    ));
    assert_eq!(db.row_count::<Gadget>().unwrap(), 0);
    assert!(session.has_changes());
}

#[test]
fn deleting_a_row_removed_elsewhere_fails_not_found() {
    let db = seeded_db();
    let session = DbSession::new(db.clone());
    let set = session.set::<Widget>();
    let handle = set.attach(Widget::new(1, "bolt")).unwrap();
    set.remove(&handle).unwrap();

    let rival = DbSession::new(db);
    let rival_set = rival.set::<Widget>();
    let row = rival_set.query().find(1).unwrap().unwrap();
    rival_set.remove(&row).unwrap();
    rival.commit().unwrap();

    let err = session.commit().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.origin, ErrorOrigin::Store);
}

#[test]
fn key_edits_are_rejected_at_commit() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();
    let handle = set.query().find(3).unwrap().unwrap();

    handle.update(|w| w.id = 30);

    let err = session.commit().unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn no_tracking_session_returns_fresh_handles() {
    let session = DbSession::new(seeded_db()).tracking(QueryTracking::NoTracking);
    let set = session.set::<Widget>();

    let first = set.query().find(1).unwrap().unwrap();
    let second = set.query().find(1).unwrap().unwrap();

    assert!(!first.ptr_eq(&second));
    assert_eq!(set.state_of(&first), None);
    assert!(set.attach(Widget::new(1, "bolt")).is_ok());
}

#[test]
fn snapshot_policy_does_not_see_later_commits() {
    let session = DbSession::new(seeded_db()).read_policy(ReadPolicy::Snapshot);
    let set = session.set::<Widget>();
    let query = set.query();

    assert_eq!(query.count().unwrap(), 5);

    set.add(Widget::new(6, "cam")).unwrap();
    session.commit().unwrap();

    assert_eq!(query.count().unwrap(), 5);
    assert_eq!(set.query().count().unwrap(), 6);
}

#[test]
fn missing_store_surfaces_unavailable() {
    let session = DbSession::new(Db::new());
    let err = session.set::<Widget>().query().execute().unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(err.origin, ErrorOrigin::Store);
}

#[test]
fn closed_session_rejects_operations() {
    let session = DbSession::new(seeded_db());
    session.close();
    let set = session.set::<Widget>();

    assert!(!session.is_open());
    assert!(set.query().execute().unwrap_err().is_unavailable());
    assert!(set.add(Widget::new(7, "pin")).unwrap_err().is_unavailable());
    assert_eq!(session.commit().unwrap_err().origin, ErrorOrigin::Session);
}

#[test]
fn discard_changes_drops_pending_work() {
    let db = seeded_db();
    let session = DbSession::new(db.clone());
    let set = session.set::<Widget>();
    set.add(Widget::new(8, "clip")).unwrap();

    session.discard_changes();

    assert!(!session.has_changes());
    assert!(session.commit().unwrap().is_empty());
    assert_eq!(db.row_count::<Widget>().unwrap(), 5);
}

#[test]
fn detach_releases_identity() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();
    let handle = set.query().find(2).unwrap().unwrap();

    set.detach(&handle).unwrap();

    let again = set.query().find(2).unwrap().unwrap();
    assert!(!again.ptr_eq(&handle));
    assert!(set.detach(&handle).unwrap_err().is_not_tracked());
}

#[test]
fn config_applies_policy() {
    let config = SessionConfig::from_toml_str("read_policy = \"snapshot\"").unwrap();
    let session = DbSession::with_config(seeded_db(), &config);

    assert_eq!(session.set::<Widget>().query().policy(), ReadPolicy::Snapshot);
}

#[test]
fn session_sink_receives_events() {
    struct Capture(RefCell<Vec<MetricsEvent>>);

    impl MetricsSink for Capture {
        fn record(&self, event: MetricsEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    let sink: &'static Capture = Box::leak(Box::new(Capture(RefCell::new(Vec::new()))));
    let session = DbSession::new(seeded_db()).metrics_sink(sink);
    let set = session.set::<Widget>();

    set.add(Widget::new(10, "hook")).unwrap();
    session.commit().unwrap();

    let events = sink.0.borrow();
    assert!(events.contains(&MetricsEvent::Track {
        kind: TrackKind::Add,
        entity_path: Widget::PATH,
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        MetricsEvent::CommitRows { inserted: 1, .. }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        MetricsEvent::ExecFinish { kind: ExecKind::Commit, ok: true, rows_touched: 1, .. }
    )));
}

#[test]
fn outstanding_borrow_does_not_poison_the_session() {
    let session = DbSession::new(seeded_db());
    let set = session.set::<Widget>();
    let handle = set.attach(Widget::new(2, "nut")).unwrap();

    let guard = handle.borrow_mut();
    let err = session.commit().unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(session.has_changes());

    drop(guard);
    session.close();
    assert!(!session.is_open());
}
