// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn fanout_job(id: &str, list: &[&str]) -> JobSpec {
    JobSpec::new(id, Command::new("fanout").kwarg("names", names(list))).with_context()
}

#[tokio::test]
async fn declaring_job_finishes_after_its_declarations() {
    let mut h = Harness::new();
    h.define(fanout_job("gen", &["x", "y"]));

    let done = h.make(&["gen"], 1).await.unwrap();

    assert_eq!(done, report(&["gen", "x", "y"], &[], &[]));
    let events = h.events.events();
    let gen_done = position(&events, "job:succeeded", "gen").unwrap();
    assert!(position(&events, "job:expanded", "gen").unwrap() < gen_done);
    for child in ["x", "y"] {
        assert!(position(&events, "job:succeeded", child).unwrap() < gen_done, "{child}");
    }

    let gen = h.session.job(&"gen".into()).unwrap();
    assert_eq!(gen.spawned, ids(&["x", "y"]));
    assert_eq!(gen.children, ids(&["x", "y"]));
    assert_eq!(h.cache("gen").jobs_defined, ids(&["x", "y"]));
    assert_eq!(
        h.session.job(&"x".into()).unwrap().defined_by,
        vec![JobId::root(), JobId::new("gen")]
    );
    assert_eq!(h.result("gen"), Some(Value::List(vec![Value::promise("x"), Value::promise("y")])));
    assert!(h.consistency().is_empty(), "{:?}", h.consistency());
}

#[tokio::test]
async fn consumer_of_a_declaring_job_sees_resolved_values() {
    let registry = registry().with("join", |inv| {
        let parts: Vec<&str> =
            inv.arg(0)?.as_list().unwrap_or_default().iter().filter_map(Value::as_str).collect();
        Ok(Value::from(parts.join("+")))
    });
    let mut h = Harness::with_registry(registry);
    h.define(fanout_job("gen", &["x", "y"]));
    h.define(JobSpec::new("joined", Command::new("join").arg(Value::promise("gen"))));

    h.make(&["joined"], 2).await.unwrap();

    assert_eq!(h.result("joined"), Some(Value::from("x+y")));
    assert_eq!(h.children("joined"), ids(&["gen", "x", "y"]));
}

fn delegating_registry() -> Registry {
    registry()
        .with("delegate_e", |inv| {
            let f = inv
                .context()?
                .define_dynamic_job(JobSpec::new("f", Command::new("delegate_f")).with_context())?;
            Ok(f.promise())
        })
        .with("delegate_f", |inv| {
            let g = inv.context()?.define_dynamic_job(JobSpec::new("g", Command::new("value").arg(2)))?;
            Ok(g.promise())
        })
        .with("expect_two", |inv| {
            anyhow::ensure!(inv.arg(0)? == &Value::Int(2), "expected 2, got {:?}", inv.arg(0)?);
            Ok(Value::Null)
        })
}

fn define_delegation(h: &mut Harness) {
    h.define(JobSpec::new("e", Command::new("delegate_e")).with_context());
    h.define(JobSpec::new("h", Command::new("expect_two").arg(Value::promise("e"))));
}

#[tokio::test]
async fn delegated_results_extend_the_parent_and_survive_redefinition() {
    let mut h = Harness::with_registry(delegating_registry());
    define_delegation(&mut h);
    assert_eq!(h.children("h"), ids(&["e"]));

    let done = h.make(&["h"], 1).await.unwrap();

    assert_eq!(done, report(&["e", "f", "g", "h"], &[], &[]));
    assert_eq!(h.children("h"), ids(&["e", "f", "g"]));
    assert_eq!(h.session.job(&"f".into()).unwrap().defined_by, vec![JobId::root(), "e".into()]);
    assert_eq!(
        h.session.job(&"g".into()).unwrap().defined_by,
        vec![JobId::root(), "e".into(), "f".into()]
    );
    assert!(h.consistency().is_empty(), "{:?}", h.consistency());

    // Declaring the top-level jobs again must not lose what the run learned.
    let mut later = h.reopen_with(delegating_registry());
    define_delegation(&mut later);
    assert!(later.consistency().is_empty(), "{:?}", later.consistency());
    assert_eq!(later.children("h"), ids(&["e", "f", "g"]));
    assert_eq!(later.make(&["h"], 1).await.unwrap(), MakeReport::default());
}

#[tokio::test]
async fn changed_declarations_replace_children_and_keep_orphans() {
    let mut h = Harness::new();
    h.define(fanout_job("gen", &["x", "y"]));
    h.define(JobSpec::new("count", Command::new("len").arg(Value::promise("gen"))));
    h.make(&["count"], 1).await.unwrap();
    assert_eq!(h.children("count"), ids(&["gen", "x", "y"]));

    let mut later = h.reopen();
    later.define(fanout_job("gen", &["x", "z"]));
    later.define(JobSpec::new("count", Command::new("len").arg(Value::promise("gen"))));
    let done = later.make(&["count"], 1).await.unwrap();

    assert_eq!(done, report(&["count", "gen", "z"], &[], &[]));
    assert_eq!(later.children("count"), ids(&["gen", "x", "z"]));
    assert_eq!(later.session.job(&"gen".into()).unwrap().spawned, ids(&["x", "z"]));
    assert_eq!(later.cache("gen").jobs_defined, ids(&["x", "z"]));
    assert_eq!(later.result("count"), Some(Value::Int(2)));

    // The job no longer declared stays in the graph with its old result.
    assert!(later.session.graph().contains(&"y".into()));
    assert_eq!(later.result("y"), Some(Value::from("y")));
    assert!(later.consistency().is_empty(), "{:?}", later.consistency());
}

#[tokio::test]
async fn failing_declared_job_blocks_its_declarer() {
    let registry = registry().with("declare_doomed", |inv| {
        let doomed = inv.context()?.define_dynamic_job(JobSpec::new("doomed", Command::new("fail")))?;
        Ok(doomed.promise())
    });
    let mut h = Harness::with_registry(registry);
    h.define(JobSpec::new("decl", Command::new("declare_doomed")).with_context());
    h.sum("after", &["decl"]);

    let err = h.make(&["after"], 1).await.unwrap_err();

    match err {
        EngineError::MakeFailed { failed, blocked } => {
            assert_eq!(failed, ids(&["doomed"]));
            assert_eq!(blocked, ids(&["after", "decl"]));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.state("decl"), CacheState::Blocked);
    assert_eq!(h.result("decl"), None);
    assert_eq!(h.session.graph().db().result_tmp(&"decl".into()).unwrap(), None);
}

#[tokio::test]
async fn declaration_creating_a_cycle_fails_the_declarer() {
    let registry = registry().with("loop_back", |inv| {
        let owner = inv.id().clone();
        inv.context()?.define_dynamic_job(JobSpec::new("inner", Command::new("value").arg(1)).after(owner))?;
        Ok(Value::Null)
    });
    let mut h = Harness::with_registry(registry);
    h.define(JobSpec::new("outer", Command::new("loop_back")).with_context());

    let err = h.make(&["outer"], 1).await.unwrap_err();

    assert!(matches!(err, EngineError::MakeFailed { ref failed, .. } if failed == &ids(&["outer"])));
    let exception = h.cache("outer").exception.unwrap_or_default();
    assert!(exception.starts_with("invalid dynamic declaration"), "{exception}");
    assert!(exception.contains("dependency cycle"), "{exception}");

    // The rejected declaration never reached the graph or the store.
    assert!(h.session.job(&"inner".into()).is_err());
    assert!(h.reopen().session.job(&"inner".into()).is_err());
    assert!(h.consistency().is_empty());
}

#[tokio::test]
async fn declaring_an_unregistered_function_fails_the_declarer() {
    let registry = registry().with("declare_unknown", |inv| {
        inv.context()?.define_dynamic_job(JobSpec::new("mystery", Command::new("nope")))?;
        Ok(Value::Null)
    });
    let mut h = Harness::with_registry(registry);
    h.define(JobSpec::new("decl", Command::new("declare_unknown")).with_context());

    let err = h.make(&["decl"], 1).await.unwrap_err();

    assert!(matches!(err, EngineError::MakeFailed { .. }));
    let exception = h.cache("decl").exception.unwrap_or_default();
    assert!(exception.contains("unknown function \"nope\""), "{exception}");
    assert!(!h.session.graph().contains(&"mystery".into()));
}

#[tokio::test]
async fn context_is_refused_to_jobs_declared_without_one() {
    let mut h = Harness::new();
    h.define(JobSpec::new("plain", Command::new("fanout").kwarg("names", names(&["x"]))));

    h.make(&["plain"], 1).await.unwrap_err();

    let exception = h.cache("plain").exception.unwrap_or_default();
    assert!(exception.contains("does not take a context"), "{exception}");
}
