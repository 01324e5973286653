// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn promises_collects_args_and_kwargs() {
    let cmd = Command::new("sum")
        .arg(Value::promise("a"))
        .arg(3)
        .kwarg("other", Value::List(vec![Value::promise("b")]));

    let ids: Vec<String> = cmd.promises().iter().map(|i| i.to_string()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn identical_commands_have_no_diff() {
    let a = Command::new("f").arg(1).kwarg("k", "v");
    assert!(a.same_as(&a.clone()));
    assert_eq!(Command::diff(&a, &a.clone()), None);
}

#[test]
fn diff_names_changed_function() {
    let reason = Command::diff(&Command::new("f"), &Command::new("g")).unwrap();
    assert!(reason.contains("function changed"), "{reason}");
    assert!(reason.contains("old: f"));
    assert!(reason.contains("new: g"));
}

#[test]
fn diff_names_changed_positional_argument() {
    let reason =
        Command::diff(&Command::new("f").arg(1).arg(2), &Command::new("f").arg(1).arg(5))
            .unwrap();
    assert!(reason.contains("arg #1 changed"), "{reason}");
    assert!(!reason.contains("arg #0"));
}

#[test]
fn diff_reports_argument_count() {
    let reason = Command::diff(&Command::new("f").arg(1), &Command::new("f")).unwrap();
    assert!(reason.contains("different number of arguments (1 -> 0)"), "{reason}");
}

#[yare::parameterized(
    removed = { Command::new("f").kwarg("k", 1), Command::new("f"),              "kwarg \"k\" not found" },
    added   = { Command::new("f"),              Command::new("f").kwarg("k", 1), "kwarg \"k\" added" },
    changed = { Command::new("f").kwarg("k", 1), Command::new("f").kwarg("k", 2), "argument \"k\" changed" },
)]
fn diff_reports_kwargs(old: Command, new: Command, expected: &str) {
    let reason = Command::diff(&old, &new).unwrap();
    assert!(reason.contains(expected), "{reason}");
}

#[test]
fn opaque_arguments_always_differ() {
    let cmd = Command::new("f").arg(Value::Opaque("handle".into()));
    let reason = Command::diff(&cmd, &cmd.clone()).unwrap();
    assert!(reason.contains("arg #0 changed"));
}

#[test]
fn display_renders_call() {
    let cmd = Command::new("f").arg(1).arg(Value::promise("a")).kwarg("k", "v");
    assert_eq!(cmd.to_string(), "f(1, Promise(a), k=\"v\")");
}
