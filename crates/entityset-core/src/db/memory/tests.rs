use super::*;
use crate::{
    error::{ErrorClass, ErrorOrigin},
    test_support::{Widget, widgets},
};

fn seeded() -> MemorySet<Widget> {
    MemorySet::with_rows(widgets())
}

#[test]
fn add_then_commit_inserts_row() {
    let set = seeded();
    let handle = set.add(Widget::new(6, "cam")).unwrap();

    assert_eq!(set.query().count().unwrap(), 5);
    assert_eq!(set.state_of(&handle), Some(EntityState::Added));

    set.commit().unwrap();

    assert_eq!(set.row_count(), 6);
    assert!(set.query().find(6).unwrap().unwrap().ptr_eq(&handle));
}

#[test]
fn attach_remove_commit_deletes_row() {
    let set = seeded();
    let handle = set.attach(Widget::new(3, "washer").with_qty(15)).unwrap();

    set.remove(&handle).unwrap();
    assert_eq!(set.state_of(&handle), Some(EntityState::Deleted));

    let summary = set.commit().unwrap();

    assert_eq!(summary.deleted, 1);
    assert!(set.query().find(3).unwrap().is_none());
}

#[test]
fn removing_pending_insert_cancels_it() {
    let set = seeded();
    let handle = set.add(Widget::new(7, "pin")).unwrap();

    set.remove(&handle).unwrap();

    assert!(!set.has_changes());
    assert!(set.commit().unwrap().is_empty());
    assert_eq!(set.row_count(), 5);
}

#[test]
fn adding_an_existing_key_fails_at_commit() {
    let set = seeded();
    set.add(Widget::new(1, "dup")).unwrap();

    let err = set.commit().unwrap_err();

    assert_eq!(err.class, ErrorClass::Conflict);
    assert_eq!(err.origin, ErrorOrigin::Store);
    assert_eq!(set.rows()[0].name, "bolt");
}

#[test]
fn attaching_a_missing_row_fails_delete_at_commit() {
    let set = seeded();
    let ghost = set.attach(Widget::new(99, "ghost")).unwrap();
    set.remove(&ghost).unwrap();

    let err = set.commit().unwrap_err();

    assert!(err.is_not_found());
    assert!(err.message.contains("99"));
}

#[test]
fn rejected_commit_writes_nothing() {
    let set = seeded();
    set.add(Widget::new(8, "clip")).unwrap();
    set.add(Widget::new(2, "dup")).unwrap();

    assert!(set.commit().is_err());
    assert_eq!(set.row_count(), 5);
    assert!(set.has_changes());
}

#[test]
fn modified_entities_persist() {
    let set = seeded();
    let bolt = set.query().find(1).unwrap().unwrap();

    bolt.update(|w| w.name = "hex bolt".to_string());
    let summary = set.commit().unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(set.rows()[0].name, "hex bolt");
    assert_eq!(set.state_of(&bolt), Some(EntityState::Unchanged));
}

#[test]
fn unavailable_set_passes_errors_through() {
    let set = seeded();
    set.set_available(false);

    let err = set.query().execute().unwrap_err();
    assert!(err.is_unavailable());
    assert!(set.add(Widget::new(6, "cam")).unwrap_err().is_unavailable());
    assert!(set.commit().unwrap_err().is_unavailable());

    set.set_available(true);
    assert_eq!(set.query().count().unwrap(), 5);
}

#[test]
fn detach_then_reattach() {
    let set = seeded();
    let handle = set.attach(Widget::new(4, "gear")).unwrap();

    set.detach(&handle).unwrap();
    assert_eq!(set.state_of(&handle), None);

    assert!(set.attach(handle.clone()).unwrap().ptr_eq(&handle));
}

#[test]
fn discard_changes_forgets_everything() {
    let set = seeded();
    set.add(Widget::new(6, "cam")).unwrap();
    let first = set.query().find(1).unwrap().unwrap();

    set.discard_changes();

    assert!(!set.has_changes());
    assert!(!set.query().find(1).unwrap().unwrap().ptr_eq(&first));
}

#[test]
fn config_sets_tracking_mode() {
    let config = SessionConfig::from_toml_str("tracking = \"no_tracking\"").unwrap();
    let set = MemorySet::<Widget>::with_config(&config);

    assert_eq!(set.query().tracking(), QueryTracking::NoTracking);
}

#[test]
fn commit_with_outstanding_borrow_is_rejected() {
    let set = seeded();
    let handle = set.add(Widget::new(6, "cam")).unwrap();

    let guard = handle.borrow_mut();
    let err = set.commit().unwrap_err();

    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(err.origin, ErrorOrigin::Tracker);
    assert!(set.has_changes());
    assert_eq!(set.row_count(), 5);

    drop(guard);
    assert_eq!(set.commit().unwrap().inserted, 1);
}
