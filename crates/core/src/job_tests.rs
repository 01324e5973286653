// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{command_on, ids};

#[test]
fn new_adds_promises_to_children() {
    let job = Job::new("c", ids(&["x"]), command_on("f", &["a", "b"]), vec![], false);
    assert_eq!(job.static_children, ids(&["a", "b", "x"]));
    assert_eq!(job.children, ids(&["a", "b", "x"]));
}

#[test]
fn new_defaults_defined_by_to_root() {
    let job = Job::new("c", [], Command::new("f"), vec![], false);
    assert_eq!(job.defined_by, vec![JobId::root()]);
    assert!(!job.is_dynamic());
    assert_eq!(job.declared_by(), None);
}

#[test]
fn dynamic_job_knows_its_declarer() {
    let job =
        Job::new("f", [], Command::new("f"), vec![JobId::root(), JobId::new("e")], false);
    assert!(job.is_dynamic());
    assert_eq!(job.declared_by(), Some(&JobId::new("e")));
    assert_eq!(job.context_stack(), vec![JobId::root(), JobId::new("e"), JobId::new("f")]);
}

#[test]
fn recompute_children_unions_all_sources() {
    let mut job = Job::new("h", ids(&["e"]), Command::new("h"), vec![], false);
    job.dynamic_children.insert(JobId::new("e"), ids(&["f", "g"]));
    job.spawned = ids(&["s"]);
    job.recompute_children();
    assert_eq!(job.children, ids(&["e", "f", "g", "s"]));
}

#[test]
fn same_declaration_ignores_dynamic_edges() {
    let a = Job::new("h", ids(&["e"]), Command::new("h"), vec![], false);
    let mut b = a.clone();
    b.dynamic_children.insert(JobId::new("e"), ids(&["f"]));
    b.recompute_children();
    assert!(a.same_declaration(&b));

    let c = Job::new("h", ids(&["e"]), Command::new("h").arg(1), vec![], false);
    assert!(!a.same_declaration(&c));
}

#[test]
fn definition_diff_reports_dependency_changes() {
    let old = Job::new("h", ids(&["a"]), Command::new("h"), vec![], false).definition();
    let new = Job::new("h", ids(&["b"]), Command::new("h"), vec![], false).definition();
    let reason = old.diff(&new).unwrap();
    assert!(reason.contains("dependencies changed"), "{reason}");
    assert!(reason.contains("added: b"));
    assert!(reason.contains("removed: a"));
}

#[test]
fn definition_diff_reports_generated_jobs() {
    let job = Job::new("h", ids(&["e"]), Command::new("h"), vec![], false);
    let old = job.definition();
    let mut changed = job.clone();
    changed.dynamic_children.insert(JobId::new("e"), ids(&["f"]));
    let reason = old.diff(&changed.definition()).unwrap();
    assert!(reason.contains("jobs generated by \"e\" changed"), "{reason}");
    assert_eq!(job.definition().diff(&job.definition()), None);
}

#[test]
fn parents_are_not_serialized() {
    let job = Job::builder().id("a").parents(ids(&["p"])).build();
    let json = serde_json::to_string(&job).unwrap();
    let back: Job = serde_json::from_str(&json).unwrap();
    assert!(back.parents.is_empty());
    assert_eq!(back.id, "a");
}
