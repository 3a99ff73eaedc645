//! Debug sessions emit tracing events without changing behaviour.

use entityset_core::{
    config::SessionConfig,
    db::{Db, DbSession, MemorySet},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Note {
    id: u64,
    body: String,
}

impl Path for Note {
    const PATH: &'static str = "debug_logging::Note";
}

impl EntityKey for Note {
    type Key = u64;
}

impl EntityKind for Note {
    fn key(&self) -> Self::Key {
        self.id
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("entityset_core=debug"))
        .with_test_writer()
        .try_init();
}

#[test]
fn debug_session_round_trip() {
    init_tracing();

    let config = SessionConfig::from_toml_str("debug = true").unwrap();
    let session = DbSession::with_config(Db::new().with_store::<Note>(), &config);
    let notes = session.set::<Note>();

    let note = notes
        .add(Note {
            id: 1,
            body: "hello".to_string(),
        })
        .unwrap();
    session.commit().unwrap();

    note.update(|n| n.body.push_str(", world"));
    let summary = session.commit().unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(notes.query().first().unwrap().unwrap().get().body, "hello, world");
}

#[test]
fn debug_memory_set_reports_rejections() {
    init_tracing();

    let set = MemorySet::with_rows([Note {
        id: 7,
        body: "seed".to_string(),
    }])
    .debug();

    set.add(Note {
        id: 7,
        body: "dup".to_string(),
    })
    .unwrap();

    assert!(set.commit().unwrap_err().is_conflict());
    assert_eq!(set.rows()[0].body, "seed");
}
