// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store persistence tests
//!
//! Everything a session learns lives in the store and survives reopening.

use crate::prelude::*;
use similar_asserts::assert_eq;
use mk_storage::{FsStore, JobDb, Store};
use serial_test::serial;

#[tokio::test]
async fn records_are_written_per_job() {
    let project = Project::empty();
    let mut session = project.session();
    value(&mut session, "a", 1);
    sum(&mut session, "b", &["a"]);
    session.make(&ids(&["b"])).await.unwrap();
    drop(session);

    let store = FsStore::compressed(project.path().join("store")).unwrap();
    let mut keys = store.keys().unwrap();
    keys.sort();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["a:cache", "a:definition", "a:result", "b:cache", "b:definition", "b:result"]
    );

    let db = JobDb::new(Arc::new(store));
    assert_eq!(db.result(&"b".into()).unwrap(), Some(Value::Int(1)));
    assert_eq!(db.job_ids().unwrap(), ids(&["a", "b"]));
}

#[tokio::test]
async fn deleting_a_job_removes_its_records() {
    let project = Project::empty();
    let mut session = project.session().with_confirm(Arc::new(FakeConfirm::answering(true)));
    value(&mut session, "a", 1);
    sum(&mut session, "b", &["a"]);
    session.make(&ids(&["b"])).await.unwrap();

    let err = session.delete(&"a".into()).unwrap_err();
    assert!(matches!(err, EngineError::User(UserError::HasDependents { .. })));
    assert_eq!(session.delete_with_dependents(&"a".into()).unwrap(), ids(&["a", "b"]));

    let reopened = project.session();
    assert!(reopened.list_ids(None).unwrap().is_empty());
    let store = FsStore::compressed(project.path().join("store")).unwrap();
    assert!(store.keys().unwrap().is_empty());
}

#[test]
#[serial]
fn environment_overrides_the_config_file() {
    let project = Project::empty();
    let file = project.path().join("mk.toml");
    std::fs::write(&file, "parallelism = 2\ncompress = true\n").unwrap();

    std::env::set_var("MK_PARALLELISM", "6");
    let config = EngineConfig::load(Some(&file));
    std::env::remove_var("MK_PARALLELISM");

    let config = config.unwrap();
    assert_eq!(config.parallelism, 6);
    assert!(config.compress);
}
