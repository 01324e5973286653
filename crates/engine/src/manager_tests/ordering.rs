// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn children_run_before_parents() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.value("b", 2);
    h.sum("c", &["a", "b"]);

    let done = h.make(&["c"], 1).await.unwrap();

    assert_eq!(done, report(&["a", "b", "c"], &[], &[]));
    assert_eq!(h.events.started(), vec![JobId::new("a"), "b".into(), "c".into()]);
    assert_eq!(h.result("c"), Some(Value::Int(3)));
    assert!(h.cache("c").timestamp > h.cache("b").timestamp);
}

#[tokio::test]
async fn sequential_runs_pick_ready_jobs_in_id_order() {
    let mut h = Harness::new();
    for id in ["z", "m", "a"] {
        h.value(id, id);
    }

    h.make(&["m", "z", "a"], 1).await.unwrap();

    assert_eq!(h.events.started(), vec![JobId::new("a"), "m".into(), "z".into()]);
}

#[tokio::test]
async fn parallel_diamond_waits_for_both_branches() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.sum("b", &["a"]);
    h.sum("c", &["a"]);
    h.sum("d", &["b", "c"]);

    h.make(&["d"], 4).await.unwrap();

    let events = h.events.events();
    let d_starts = position(&events, "job:starting", "d").unwrap();
    for child in ["b", "c"] {
        assert!(position(&events, "job:succeeded", child).unwrap() < d_starts, "{child}");
        assert!(position(&events, "job:starting", child).unwrap() > position(&events, "job:succeeded", "a").unwrap());
    }
    assert_eq!(h.result("d"), Some(Value::Int(2)));
}

#[tokio::test]
async fn manager_events_bracket_the_run() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.make(&["a"], 2).await.unwrap();

    let events = h.events.events();
    assert!(matches!(
        events.first(),
        Some(Event::ManagerStarted { todo: 1, parallelism: 2, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(Event::ManagerFinished { succeeded: 1, failed: 0, blocked: 0 })
    ));
}

#[tokio::test]
async fn up_to_date_jobs_are_not_run_again() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.sum("b", &["a"]);
    h.make(&["b"], 1).await.unwrap();

    assert_eq!(h.make(&["b"], 1).await.unwrap(), MakeReport::default());

    // A later process declaring the same jobs finds nothing to do.
    let mut later = h.reopen();
    later.value("a", 1);
    later.sum("b", &["a"]);
    assert_eq!(later.session.is_up_to_date(&"b".into()).unwrap(), (true, String::new()));
    assert_eq!(later.make(&["b"], 1).await.unwrap(), MakeReport::default());
    assert!(later.events.started().is_empty());
}

#[tokio::test]
async fn changed_definition_reruns_the_job_and_its_dependents() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.value("b", 2);
    h.sum("c", &["a", "b"]);
    h.make(&["c"], 1).await.unwrap();

    let mut later = h.reopen();
    later.value("a", 10);
    later.value("b", 2);
    later.sum("c", &["a", "b"]);

    let (ok, reason) = later.session.is_up_to_date(&"a".into()).unwrap();
    assert!(!ok);
    assert!(reason.contains("arg #0 changed"), "{reason}");

    let done = later.make(&["c"], 1).await.unwrap();
    assert_eq!(done, report(&["a", "c"], &[], &[]));
    assert_eq!(later.result("c"), Some(Value::Int(12)));
}

#[tokio::test]
async fn remake_sentinel_reruns_job_and_parents() {
    let mut h = Harness::new();
    h.value("a", 1);
    h.sum("b", &["a"]);
    h.sum("c", &["b"]);
    h.make(&["c"], 1).await.unwrap();

    assert!(h.session.mark_remake(&"b".into()).unwrap());
    let done = h.make(&["c"], 1).await.unwrap();

    assert_eq!(done, report(&["b", "c"], &[], &[]));
    assert!(!h.cache("b").remake_requested());
}

#[tokio::test]
async fn unknown_target_is_a_user_error() {
    let mut h = Harness::new();
    let err = h.make(&["ghost"], 1).await.unwrap_err();
    assert!(matches!(err, EngineError::User(UserError::NotFound(ref id)) if id == "ghost"));
}

#[tokio::test]
async fn captured_output_is_stored_with_the_cache() {
    let registry = registry().with("chatty", |inv| {
        inv.print("hello");
        inv.eprint("warning");
        Ok(Value::Null)
    });
    let mut h = Harness::with_registry(registry);
    h.define(JobSpec::new("talk", Command::new("chatty")));
    h.make(&["talk"], 1).await.unwrap();

    let cache = h.cache("talk");
    assert_eq!(cache.captured_stdout.as_deref(), Some("hello\n"));
    assert_eq!(cache.captured_stderr.as_deref(), Some("warning\n"));
    assert!(cache.walltime_used.is_some());
    assert!(!cache.in_progress);
    assert_eq!(cache.recorded, Some(h.session.job(&"talk".into()).unwrap().definition()));
}
