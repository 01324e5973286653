// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure handling tests
//!
//! A failing job never stops unrelated work; everything above it is blocked.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn failure_is_isolated_to_its_dependents() {
    let project = Project::empty();
    let mut session = project.session();
    session.define_job(JobSpec::new("broken", Command::new("fail"))).unwrap();
    sum(&mut session, "uses-broken", &["broken"]);
    value(&mut session, "fine", 1);
    sum(&mut session, "uses-fine", &["fine"]);

    let result = session.execute(&ids(&["uses-broken", "uses-fine"]), 2).await;
    let (failed, blocked) = make_failed(result);

    assert_eq!(failed, vec![JobId::new("broken")]);
    assert_eq!(blocked, vec![JobId::new("uses-broken")]);
    assert_eq!(session.cache(&"uses-fine".into()).unwrap().state, CacheState::Done);

    let cache = session.cache(&"broken".into()).unwrap();
    assert_eq!(cache.exception.as_deref(), Some("broken refuses to run"));
    assert!(cache.backtrace.is_some());
}

#[tokio::test]
async fn blocked_jobs_run_once_the_failure_is_fixed() {
    let project = Project::empty();
    {
        let mut session = project.session();
        session.define_job(JobSpec::new("step", Command::new("fail"))).unwrap();
        sum(&mut session, "after", &["step"]);
        make_failed(session.make(&ids(&["after"])).await);
    }

    let mut session = project.session();
    value(&mut session, "step", 3);
    sum(&mut session, "after", &["step"]);
    let summary = session.summary(&session.list_ids(None).unwrap()).unwrap();
    assert_eq!(summary.by_state["failed"], 1);
    assert_eq!(summary.by_state["blocked"], 1);

    let report = session.make(&ids(&["after"])).await.unwrap();

    assert_eq!(report.succeeded, ids(&["after", "step"]));
    assert_eq!(session.result(&"after".into()).unwrap(), Some(Value::Int(3)));
}

#[tokio::test]
async fn interruption_leaves_a_resumable_store() {
    let project = Project::empty();
    let cancel = mk_engine::CancellationToken::new();
    let trigger = cancel.clone();
    let registry = functions().with("slow_stop", move |_| {
        trigger.cancel();
        Ok(Value::Int(2))
    });
    {
        let mut session = project.session_with(registry.clone());
        session.define_job(JobSpec::new("first", Command::new("slow_stop"))).unwrap();
        sum(&mut session, "second", &["first"]);

        match session.execute_until(&ids(&["second"]), 1, cancel).await {
            Err(EngineError::Interrupted { report }) => {
                assert_eq!(report.failed, ids(&["first"]));
                assert_eq!(report.not_reached, ids(&["second"]));
            }
            other => panic!("expected interruption, got {other:?}"),
        }
        assert!(session.check_consistency().unwrap().is_empty());
    }

    let mut session = project.session_with(registry);
    let report = session.make(&ids(&["second"])).await.unwrap();
    assert_eq!(report.succeeded, ids(&["first", "second"]));
    assert_eq!(session.result(&"second".into()).unwrap(), Some(Value::Int(2)));
}
