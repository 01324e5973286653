// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// Registry whose `stop` body fires `token` before returning.
fn stopping_registry(token: &CancellationToken) -> Registry {
    let token = token.clone();
    registry()
        .with("stop", move |_| {
            token.cancel();
            Ok(Value::Int(1))
        })
        .with("declare_stop", |inv| {
            let stop = inv.context()?.define_dynamic_job(JobSpec::new("stopper", Command::new("stop")))?;
            Ok(stop.promise())
        })
}

fn expect_interrupted(result: Result<MakeReport, EngineError>) -> MakeReport {
    match result {
        Err(EngineError::Interrupted { report }) => report,
        other => panic!("expected interruption, got {other:?}"),
    }
}

#[tokio::test]
async fn interruption_fails_running_jobs_and_reports_the_rest() {
    let token = CancellationToken::new();
    let mut h = Harness::with_registry(stopping_registry(&token));
    h.define(JobSpec::new("a", Command::new("stop")));
    h.sum("b", &["a"]);
    h.value("c", 3);

    let report = expect_interrupted(h.session.execute_until(&ids(&["b", "c"]), 1, token).await);

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed, ids(&["a"]));
    assert_eq!(report.not_reached, ids(&["b", "c"]));
    assert_eq!(h.events.names_for("a"), vec!["job:starting", "job:interrupted"]);

    let cache = h.cache("a");
    assert_eq!(cache.state, CacheState::Failed);
    assert_eq!(cache.exception.as_deref(), Some("interrupted"));
    assert_eq!(h.result("a"), None);
    assert!(h.consistency().is_empty(), "{:?}", h.consistency());
}

#[tokio::test]
async fn interrupted_session_can_be_resumed() {
    let token = CancellationToken::new();
    let mut h = Harness::with_registry(stopping_registry(&token));
    h.define(JobSpec::new("a", Command::new("stop")));
    h.sum("b", &["a"]);
    expect_interrupted(h.session.execute_until(&ids(&["b"]), 1, token.clone()).await);

    // The first token stays cancelled; a fresh run is unaffected by it.
    let done = h.make(&["b"], 1).await.unwrap();

    assert_eq!(done, report(&["a", "b"], &[], &[]));
    assert_eq!(h.result("b"), Some(Value::Int(1)));
}

#[tokio::test]
async fn waiting_declarer_is_interrupted_with_its_declaration() {
    let token = CancellationToken::new();
    let mut h = Harness::with_registry(stopping_registry(&token));
    h.define(JobSpec::new("decl", Command::new("declare_stop")).with_context());

    let report = expect_interrupted(h.session.execute_until(&ids(&["decl"]), 2, token).await);

    assert_eq!(report.failed, ids(&["decl", "stopper"]));
    assert_eq!(h.state("decl"), CacheState::Failed);
    assert_eq!(h.session.graph().db().result_tmp(&"decl".into()).unwrap(), None);
    assert_eq!(h.events.names_for("decl"), vec!["job:starting", "job:expanded", "job:interrupted"]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let mut h = Harness::new();
    h.value("a", 1);

    let report = expect_interrupted(h.session.execute_until(&ids(&["a"]), 1, token).await);

    assert_eq!(report.not_reached, ids(&["a"]));
    assert!(h.events.started().is_empty());
    assert_eq!(h.state("a"), CacheState::NotStarted);
}
