// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hooks::{FakeConfirm, FakeEventSink};
use mk_core::test_support::{command_on, ids};
use mk_core::{Command, FakeClock};
use mk_storage::MemoryStore;

fn registry() -> Registry {
    Registry::new()
        .with("value", |inv| Ok(inv.arg(0)?.clone()))
        .with("sum", |inv| Ok(Value::Int(inv.args().iter().filter_map(Value::as_int).sum())))
}

fn session(store: &MemoryStore) -> Session {
    Session::open(Arc::new(store.clone()), registry())
        .unwrap()
        .with_clock(Arc::new(FakeClock::ticking()))
}

/// a <- b <- c, with c also depending on d.
fn define_chain(s: &mut Session) {
    s.define_job(JobSpec::new("a", Command::new("value").arg(1))).unwrap();
    s.define_job(JobSpec::new("b", command_on("sum", &["a"]))).unwrap();
    s.define_job(JobSpec::new("d", Command::new("value").arg(2))).unwrap();
    s.define_job(JobSpec::new("c", command_on("sum", &["b", "d"]))).unwrap();
}

async fn built(store: &MemoryStore) -> Session {
    let mut s = session(store);
    define_chain(&mut s);
    s.make(&ids(&["c"])).await.unwrap();
    s
}

fn state(s: &Session, id: &str) -> CacheState {
    s.cache(&id.into()).unwrap().state
}

#[test]
fn define_job_rejects_unknown_functions() {
    let mut s = session(&MemoryStore::new());
    let err = s.define_job(JobSpec::new("x", Command::new("missing"))).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown function \"missing\" for job x"
    );
    assert!(err.is_user());
    assert!(s.job(&"x".into()).is_err());
}

#[test]
fn define_job_is_idempotent_but_rejects_conflicts() {
    let mut s = session(&MemoryStore::new());
    let spec = JobSpec::new("a", Command::new("value").arg(1));
    let handle = s.define_job(spec.clone()).unwrap();
    assert_eq!(s.define_job(spec).unwrap(), handle);
    assert_eq!(handle.promise(), Value::promise("a"));

    let err = s.define_job(JobSpec::new("a", Command::new("value").arg(2))).unwrap_err();
    assert!(matches!(err, EngineError::User(UserError::DuplicateJob(ref id)) if id == "a"));
}

#[test]
fn define_job_requires_existing_children() {
    let mut s = session(&MemoryStore::new());
    let err = s.define_job(JobSpec::new("b", command_on("sum", &["a"]))).unwrap_err();
    assert!(err.is_user());
    assert!(err.to_string().contains("unknown dependency a"), "{err}");
}

#[tokio::test]
async fn make_uses_the_session_parallelism() {
    let store = MemoryStore::new();
    let events = FakeEventSink::new();
    let mut s = session(&store).with_events(Arc::new(events.clone())).with_parallelism(3);
    define_chain(&mut s);

    s.make(&ids(&["c"])).await.unwrap();

    assert_eq!(s.parallelism(), 3);
    assert!(matches!(
        events.events().first(),
        Some(mk_core::Event::ManagerStarted { parallelism: 3, todo: 4, .. })
    ));
    assert_eq!(s.result(&"c".into()).unwrap(), Some(Value::Int(3)));
}

#[tokio::test]
async fn staleness_reason_survives_a_new_session() {
    let store = MemoryStore::new();
    built(&store).await;

    let mut s = session(&store);
    s.define_job(JobSpec::new("a", Command::new("value").arg(1).kwarg("scale", 2))).unwrap();

    let (ok, reason) = s.is_up_to_date(&"a".into()).unwrap();
    assert!(!ok);
    assert!(reason.contains("scale"), "{reason}");
    assert_eq!(s.is_up_to_date(&"c".into()).unwrap(), (false, "child b is not up to date".to_string()));
    assert!(s.is_up_to_date(&"d".into()).unwrap().0);
}

#[tokio::test]
async fn clean_asks_first_and_resets_jobs() {
    let store = MemoryStore::new();
    let confirm = FakeConfirm::answering(true);
    let mut s = built(&store).await.with_confirm(Arc::new(confirm.clone()));

    let cleaned = s.clean(&ids(&["a", "b"])).unwrap();

    assert_eq!(cleaned, ids(&["a", "b"]));
    assert_eq!(confirm.questions(), vec!["Should I clean 2 jobs?".to_string()]);
    assert_eq!(s.cache(&"a".into()).unwrap(), Cache::default());
    assert_eq!(s.result(&"a".into()).unwrap(), None);
    assert_eq!(s.is_up_to_date(&"c".into()).unwrap(), (false, "child b is not up to date".to_string()));
    assert!(s.job(&"a".into()).is_ok());
}

#[tokio::test]
async fn declined_clean_changes_nothing() {
    let store = MemoryStore::new();
    let mut s = built(&store).await.with_confirm(Arc::new(FakeConfirm::answering(false)));

    assert!(s.clean_all().unwrap().is_empty());
    assert_eq!(state(&s, "a"), CacheState::Done);
    assert!(s.is_up_to_date(&"c".into()).unwrap().0);
}

#[tokio::test]
async fn clean_all_then_make_rebuilds_everything() {
    let store = MemoryStore::new();
    let mut s = built(&store).await;

    assert_eq!(s.clean_all().unwrap(), ids(&["a", "b", "c", "d"]));
    let report = s.make(&ids(&["c"])).await.unwrap();
    assert_eq!(report.succeeded, ids(&["a", "b", "c", "d"]));
}

#[tokio::test]
async fn clean_of_unknown_job_is_not_found() {
    let mut s = built(&MemoryStore::new()).await;
    let err = s.clean(&ids(&["a", "ghost"])).unwrap_err();
    assert!(matches!(err, EngineError::User(UserError::NotFound(_))));
    assert_eq!(state(&s, "a"), CacheState::Done);
}

#[tokio::test]
async fn mark_remake_only_touches_finished_jobs() {
    let store = MemoryStore::new();
    let mut s = session(&store);
    define_chain(&mut s);
    assert!(!s.mark_remake(&"a".into()).unwrap());

    s.make(&ids(&["c"])).await.unwrap();
    assert!(s.mark_remake(&"a".into()).unwrap());
    assert_eq!(s.is_up_to_date(&"a".into()).unwrap(), (false, "remake requested".to_string()));
}

#[tokio::test]
async fn remake_reruns_targets_even_when_up_to_date() {
    let store = MemoryStore::new();
    let confirm = FakeConfirm::answering(true);
    let mut s = built(&store).await.with_confirm(Arc::new(confirm.clone()));

    let report = s.remake(&ids(&["d"]), 1).await.unwrap();

    assert_eq!(report.succeeded, ids(&["d"]));
    assert_eq!(confirm.questions(), vec!["Should I clean and remake 1 jobs?".to_string()]);
    assert!(!s.is_up_to_date(&"c".into()).unwrap().0);
}

#[tokio::test]
async fn declined_remake_runs_nothing() {
    let mut s = built(&MemoryStore::new()).await.with_confirm(Arc::new(FakeConfirm::answering(false)));
    assert_eq!(s.remake(&ids(&["d"]), 1).await.unwrap(), MakeReport::default());
    assert!(s.is_up_to_date(&"d".into()).unwrap().0);
}

#[tokio::test]
async fn strict_delete_refuses_jobs_with_dependents() {
    let store = MemoryStore::new();
    let mut s = built(&store).await;

    let err = s.delete(&"a".into()).unwrap_err();
    assert!(matches!(err, EngineError::User(UserError::HasDependents { ref dependents, .. })
        if dependents == &ids(&["b"])));

    s.delete(&"c".into()).unwrap();
    assert!(s.job(&"c".into()).is_err());
    assert!(!s.job(&"b".into()).unwrap().parents.contains("c"));

    // Nothing of c is left in the store.
    let reopened = session(&store);
    assert_eq!(reopened.list_ids(None).unwrap(), ids(&["a", "b", "d"]));
    assert!(reopened.check_consistency().unwrap().is_empty());
}

#[tokio::test]
async fn detached_delete_fails_jobs_that_consumed_the_result() {
    let store = MemoryStore::new();
    let mut s = built(&store).await;

    s.delete_detached(&"d".into()).unwrap();
    assert!(!s.job(&"c".into()).unwrap().children.contains("d"));

    s.mark_remake(&"c".into()).unwrap();
    let err = s.make(&ids(&["c"])).await.unwrap_err();
    assert!(matches!(err, EngineError::MakeFailed { ref failed, .. } if failed == &ids(&["c"])));
    let exception = s.cache(&"c".into()).unwrap().exception.unwrap_or_default();
    assert_eq!(exception, "depends on deleted job d");
}

#[tokio::test]
async fn redefined_detached_dependency_fails_the_consumer() {
    let store = MemoryStore::new();
    let mut s = built(&store).await;

    s.delete_detached(&"d".into()).unwrap();
    s.define_job(JobSpec::new("d", Command::new("value").arg(2))).unwrap();
    s.mark_remake(&"c".into()).unwrap();

    let err = s.make(&ids(&["c"])).await.unwrap_err();
    assert!(matches!(err, EngineError::MakeFailed { ref failed, .. } if failed == &ids(&["c"])));
    let exception = s.cache(&"c".into()).unwrap().exception.unwrap_or_default();
    assert_eq!(exception, "depends on d, which is no longer a dependency");
}

#[tokio::test]
async fn float_arguments_stay_up_to_date_across_sessions() {
    let store = MemoryStore::new();
    let float = Value::Float("507270935.41344076".parse().unwrap());
    let spec = JobSpec::new("x", Command::new("value").arg(float));
    let mut s = session(&store);
    s.define_job(spec.clone()).unwrap();
    s.make(&ids(&["x"])).await.unwrap();
    assert_eq!(s.is_up_to_date(&"x".into()).unwrap(), (true, String::new()));

    let mut reopened = session(&store);
    reopened.define_job(spec).unwrap();
    assert_eq!(reopened.is_up_to_date(&"x".into()).unwrap(), (true, String::new()));
    assert_eq!(reopened.make(&ids(&["x"])).await.unwrap(), MakeReport::default());
}

#[tokio::test]
async fn reverted_change_unblocks_the_dependent() {
    let store = MemoryStore::new();
    drop(built(&store).await);

    let mut changed = session(&store);
    changed.define_job(JobSpec::new("d", Command::new("value").arg(99))).unwrap();
    let (ok, _) = changed.is_up_to_date(&"c".into()).unwrap();
    assert!(!ok);
    assert_eq!(state(&changed, "c"), CacheState::Blocked);

    let mut reverted = session(&store);
    reverted.define_job(JobSpec::new("d", Command::new("value").arg(2))).unwrap();
    assert_eq!(reverted.is_up_to_date(&"c".into()).unwrap(), (true, String::new()));
    assert_eq!(state(&reverted, "c"), CacheState::Done);
    assert_eq!(reverted.make(&ids(&["c"])).await.unwrap(), MakeReport::default());
}

#[tokio::test]
async fn cascading_delete_confirms_and_removes_dependents() {
    let store = MemoryStore::new();
    let confirm = FakeConfirm::answering(true);
    let mut s = built(&store).await.with_confirm(Arc::new(confirm.clone()));

    let deleted = s.delete_with_dependents(&"b".into()).unwrap();

    assert_eq!(deleted, ids(&["b", "c"]));
    assert_eq!(confirm.questions(), vec!["Should I delete b and 1 jobs depending on it?".to_string()]);
    assert_eq!(s.list_ids(None).unwrap(), ids(&["a", "d"]));
    assert!(s.check_consistency().unwrap().is_empty());
}

#[tokio::test]
async fn cascading_delete_without_dependents_does_not_ask() {
    let confirm = FakeConfirm::answering(false);
    let mut s = built(&MemoryStore::new()).await.with_confirm(Arc::new(confirm.clone()));

    assert_eq!(s.delete_with_dependents(&"c".into()).unwrap(), ids(&["c"]));
    assert!(confirm.questions().is_empty());
    assert!(s.delete_with_dependents(&"a".into()).unwrap().is_empty());
    assert!(s.job(&"a".into()).is_ok());
}

#[tokio::test]
async fn summary_counts_states_and_functions() {
    let store = MemoryStore::new();
    let mut s = session(&store);
    define_chain(&mut s);
    s.make(&ids(&["b"])).await.unwrap();

    let summary = s.summary(&s.list_ids(None).unwrap()).unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.by_state["done"], 2);
    assert_eq!(summary.by_state["not started"], 2);
    assert_eq!(summary.by_state["failed"], 0);
    assert_eq!(summary.by_function["sum"], 2);
    assert_eq!(summary.by_function["value"], 2);
}

#[test]
fn list_ids_filters_by_glob() {
    let mut s = session(&MemoryStore::new());
    for id in ["fit-1", "fit-2", "plot"] {
        s.define_job(JobSpec::new(id, Command::new("value").arg(id))).unwrap();
    }
    assert_eq!(s.list_ids(Some("fit-*")).unwrap(), ids(&["fit-1", "fit-2"]));
    assert!(matches!(s.list_ids(Some("nothing*")), Err(UserError::NoMatch(_))));
}

#[tokio::test]
async fn from_config_opens_a_filesystem_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().store_dir(dir.path().join("db")).parallelism(2).compress(true);

    {
        let mut s = Session::from_config(&config, registry()).unwrap();
        assert_eq!(s.parallelism(), 2);
        define_chain(&mut s);
        s.make(&ids(&["c"])).await.unwrap();
    }

    let mut s = Session::from_config(&config, registry()).unwrap();
    assert_eq!(s.list_ids(None).unwrap(), ids(&["a", "b", "c", "d"]));
    define_chain(&mut s);
    assert_eq!(s.make(&ids(&["c"])).await.unwrap(), MakeReport::default());
    assert_eq!(s.result(&"c".into()).unwrap(), Some(Value::Int(3)));
}
