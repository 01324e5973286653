// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental rebuild tests
//!
//! Only jobs whose inputs changed run again, across separate sessions.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn define_pipeline(session: &mut Session, input: i64) {
    value(session, "input", input);
    value(session, "offset", 100);
    sum(session, "total", &["input", "offset"]);
    sum(session, "report", &["total"]);
}

#[tokio::test]
async fn first_make_runs_everything_once() {
    let project = Project::empty();
    let mut session = project.session();
    define_pipeline(&mut session, 1);

    let report = session.make(&ids(&["report"])).await.unwrap();

    assert_eq!(report.succeeded, ids(&["input", "offset", "report", "total"]));
    assert_eq!(session.result(&"report".into()).unwrap(), Some(Value::Int(101)));
    assert_eq!(
        project.events.started(),
        vec![JobId::new("input"), "offset".into(), "total".into(), "report".into()]
    );
}

#[tokio::test]
async fn unchanged_pipeline_is_not_rebuilt() {
    let project = Project::empty();
    {
        let mut session = project.session();
        define_pipeline(&mut session, 1);
        session.make(&ids(&["report"])).await.unwrap();
    }

    let mut session = project.session();
    define_pipeline(&mut session, 1);
    let report = session.make(&ids(&["report"])).await.unwrap();

    assert_eq!(report, MakeReport::default());
    assert_eq!(session.is_up_to_date(&"report".into()).unwrap(), (true, String::new()));
}

#[tokio::test]
async fn changed_input_rebuilds_only_what_depends_on_it() {
    let project = Project::empty();
    {
        let mut session = project.session();
        define_pipeline(&mut session, 1);
        session.make(&ids(&["report"])).await.unwrap();
    }

    let mut session = project.session();
    define_pipeline(&mut session, 5);
    let (ok, reason) = session.is_up_to_date(&"input".into()).unwrap();
    assert!(!ok);
    assert!(reason.contains("arg #0 changed"), "{reason}");

    let report = session.make(&ids(&["report"])).await.unwrap();

    assert_eq!(report.succeeded, ids(&["input", "report", "total"]));
    assert_eq!(session.result(&"report".into()).unwrap(), Some(Value::Int(105)));
}

#[tokio::test]
async fn parallel_and_sequential_runs_agree() {
    let project = Project::empty();
    let mut session = project.session();
    for i in 0..8 {
        value(&mut session, &format!("leaf-{i}"), i);
    }
    let leaves: Vec<String> = (0..8).map(|i| format!("leaf-{i}")).collect();
    let leaves: Vec<&str> = leaves.iter().map(String::as_str).collect();
    sum(&mut session, "all", &leaves);

    let report = session.execute(&ids(&["all"]), 4).await.unwrap();

    assert_eq!(report.succeeded.len(), 9);
    assert_eq!(session.result(&"all".into()).unwrap(), Some(Value::Int(28)));

    session.clean_all().unwrap();
    session.execute(&ids(&["all"]), 1).await.unwrap();
    assert_eq!(session.result(&"all".into()).unwrap(), Some(Value::Int(28)));
}

#[tokio::test]
async fn remake_forces_a_rerun_of_fresh_jobs() {
    let project = Project::empty();
    let mut session = project.session().with_confirm(Arc::new(FakeConfirm::answering(true)));
    define_pipeline(&mut session, 1);
    session.make(&ids(&["report"])).await.unwrap();

    let report = session.remake(&ids(&["offset"]), 1).await.unwrap();
    assert_eq!(report.succeeded, ids(&["offset"]));

    let report = session.make(&ids(&["report"])).await.unwrap();
    assert_eq!(report.succeeded, ids(&["report", "total"]));
}
