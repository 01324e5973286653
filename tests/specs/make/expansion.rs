// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic expansion tests
//!
//! Jobs that declare more jobs while running.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn define_split_and_total(session: &mut Session, parts: &[i64]) {
    split_job(session, "split", parts);
    session
        .define_job(JobSpec::new("total", Command::new("sum_list").arg(Value::promise("split"))))
        .unwrap();
}

fn registry() -> Registry {
    functions().with("sum_list", |inv| {
        let items = inv.arg(0)?.as_list().unwrap_or_default();
        Ok(Value::Int(items.iter().filter_map(Value::as_int).sum()))
    })
}

#[tokio::test]
async fn declared_jobs_run_before_their_consumers() {
    let project = Project::empty();
    let mut session = project.session_with(registry());
    define_split_and_total(&mut session, &[1, 2, 3]);

    let report = session.execute(&ids(&["total"]), 3).await.unwrap();

    assert_eq!(report.succeeded, ids(&["split", "split-0", "split-1", "split-2", "total"]));
    assert_eq!(session.result(&"total".into()).unwrap(), Some(Value::Int(6)));
    assert_eq!(
        session.job(&"total".into()).unwrap().children,
        ids(&["split", "split-0", "split-1", "split-2"])
    );
    assert_eq!(project.events.names_for("split"), vec![
        "job:starting",
        "job:expanded",
        "job:succeeded"
    ]);
}

#[tokio::test]
async fn shrinking_the_expansion_reruns_only_the_consumers() {
    let project = Project::empty();
    {
        let mut session = project.session_with(registry());
        define_split_and_total(&mut session, &[1, 2, 3]);
        session.make(&ids(&["total"])).await.unwrap();
    }

    let mut session = project.session_with(registry());
    define_split_and_total(&mut session, &[1, 2]);
    let report = session.make(&ids(&["total"])).await.unwrap();

    assert_eq!(report.succeeded, ids(&["split", "total"]));
    assert_eq!(session.result(&"total".into()).unwrap(), Some(Value::Int(3)));
    assert_eq!(session.job(&"split".into()).unwrap().spawned, ids(&["split-0", "split-1"]));
    assert_eq!(
        session.job(&"total".into()).unwrap().children,
        ids(&["split", "split-0", "split-1"])
    );
    // No longer declared, but still defined.
    assert!(session.list_ids(Some("split-2")).is_ok());
    assert!(session.check_consistency().unwrap().is_empty());
}

#[tokio::test]
async fn cleaning_a_declarer_reruns_it_and_keeps_its_jobs() {
    let project = Project::empty();
    let mut session = project.session_with(registry());
    define_split_and_total(&mut session, &[4, 5]);
    session.make(&ids(&["total"])).await.unwrap();

    session.clean(&ids(&["split"])).unwrap();
    let report = session.make(&ids(&["total"])).await.unwrap();

    assert_eq!(report.succeeded, ids(&["split", "total"]));
    assert_eq!(session.result(&"total".into()).unwrap(), Some(Value::Int(9)));
}
