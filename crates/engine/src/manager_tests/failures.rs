// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn expect_failed(result: Result<MakeReport, EngineError>) -> (BTreeSet<JobId>, BTreeSet<JobId>) {
    match result {
        Err(EngineError::MakeFailed { failed, blocked }) => (failed, blocked),
        other => panic!("expected make failure, got {other:?}"),
    }
}

#[tokio::test]
async fn independent_failure_does_not_stop_other_jobs() {
    let mut h = Harness::new();
    h.define(JobSpec::new("a", Command::new("fail")));
    h.value("b", 2);

    let (failed, blocked) = expect_failed(h.make(&["a", "b"], 1).await);

    assert_eq!(failed, ids(&["a"]));
    assert!(blocked.is_empty());
    assert_eq!(h.state("a"), CacheState::Failed);
    assert_eq!(h.state("b"), CacheState::Done);
    assert_eq!(h.cache("a").exception.as_deref(), Some("a failed on purpose"));
    assert_eq!(h.result("a"), None);
}

#[tokio::test]
async fn failure_blocks_every_dependent() {
    let mut h = Harness::new();
    h.define(JobSpec::new("a", Command::new("fail")));
    h.sum("b", &["a"]);
    h.sum("c", &["b"]);
    h.value("d", 4);

    let result = h.make(&["c", "d"], 2).await;
    let err = result.as_ref().unwrap_err().to_string();
    let (failed, blocked) = expect_failed(result);

    assert_eq!(failed, ids(&["a"]));
    assert_eq!(blocked, ids(&["b", "c"]));
    assert_eq!(err, "make failed: 1 failed, 2 blocked (failed: a)");
    assert_eq!(h.state("b"), CacheState::Blocked);
    assert_eq!(h.state("c"), CacheState::Blocked);
    assert_eq!(h.state("d"), CacheState::Done);
    assert_eq!(h.events.names_for("b"), vec!["job:blocked"]);
    assert!(h.events.events().iter().any(|e| matches!(
        e,
        Event::JobBlocked { id, blocking } if id == "c" && blocking == "a"
    )));
}

#[tokio::test]
async fn panicking_body_fails_the_job() {
    let mut h = Harness::new();
    h.define(JobSpec::new("p", Command::new("panic")));

    let (failed, _) = expect_failed(h.make(&["p"], 1).await);

    assert_eq!(failed, ids(&["p"]));
    assert_eq!(h.cache("p").exception.as_deref(), Some("job panicked: kaboom"));
}

#[tokio::test]
async fn function_missing_from_a_later_registry_fails_the_job() {
    let mut h = Harness::with_registry(registry().with("extra", |_| Ok(Value::Null)));
    h.define(JobSpec::new("x", Command::new("extra")));
    h.value("y", 1);

    let mut later = h.reopen();
    let (failed, _) = expect_failed(later.make(&["x", "y"], 1).await);

    assert_eq!(failed, ids(&["x"]));
    assert_eq!(later.cache("x").exception.as_deref(), Some("unknown function \"extra\""));
    assert_eq!(later.state("y"), CacheState::Done);
    assert!(later.events.started().iter().all(|id| id != "x"));
}

#[tokio::test]
async fn fixing_the_failure_lets_blocked_jobs_run() {
    let mut h = Harness::new();
    h.define(JobSpec::new("a", Command::new("fail")));
    h.sum("b", &["a"]);
    expect_failed(h.make(&["b"], 1).await);
    assert_eq!(h.session.is_up_to_date(&"a".into()).unwrap().1, "previously failed");

    let mut later = h.reopen();
    later.value("a", 7);
    later.sum("b", &["a"]);
    let done = later.make(&["b"], 1).await.unwrap();

    assert_eq!(done, report(&["a", "b"], &[], &[]));
    assert_eq!(later.result("b"), Some(Value::Int(7)));
    let cache = later.cache("a");
    assert_eq!(cache.exception, None);
    assert_eq!(cache.backtrace, None);
}

#[tokio::test]
async fn missing_argument_is_reported_as_the_job_error() {
    let mut h = Harness::new();
    h.define(JobSpec::new("v", Command::new("value")));

    expect_failed(h.make(&["v"], 1).await);

    let exception = h.cache("v").exception.unwrap_or_default();
    assert!(exception.contains("missing argument #0"), "{exception}");
}

#[tokio::test]
async fn failed_jobs_leave_no_result_and_a_consistent_store() {
    let mut h = Harness::new();
    h.value("ok", 1);
    h.define(JobSpec::new("bad", Command::new("fail")).after("ok"));

    expect_failed(h.make(&["bad"], 1).await);

    assert_eq!(h.result("bad"), None);
    assert_eq!(h.state("ok"), CacheState::Done);
    assert!(h.consistency().is_empty(), "{:?}", h.consistency());
}
