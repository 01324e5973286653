// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command descriptors and change detection.

use crate::id::JobId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// What a job runs: a registered function name plus its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
}

impl Command {
    pub fn new(function: impl Into<String>) -> Self {
        Self { function: function.into(), args: Vec::new(), kwargs: BTreeMap::new() }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Every job whose result this command consumes.
    pub fn promises(&self) -> BTreeSet<JobId> {
        let mut ids = BTreeSet::new();
        for v in &self.args {
            v.collect_promises(&mut ids);
        }
        for v in self.kwargs.values() {
            v.collect_promises(&mut ids);
        }
        ids
    }

    /// Structural equality (see [`Value::same_as`]).
    pub fn same_as(&self, other: &Command) -> bool {
        self.function == other.function
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.same_as(b))
            && self.kwargs.len() == other.kwargs.len()
            && self.kwargs.iter().all(|(k, v)| other.kwargs.get(k).is_some_and(|o| v.same_as(o)))
    }

    /// Describe how `new` differs from `old`, or `None` when they are the same.
    ///
    /// Never fails: values that cannot be compared are reported as changed.
    pub fn diff(old: &Command, new: &Command) -> Option<String> {
        if old.same_as(new) {
            return None;
        }

        let mut reason = String::new();
        if old.function != new.function {
            let _ = writeln!(reason, "* function changed");
            let _ = writeln!(reason, "  - old: {}", old.function);
            let _ = writeln!(reason, "  - new: {}", new.function);
        }

        if old.args.len() != new.args.len() {
            let _ = writeln!(
                reason,
                "* different number of arguments ({} -> {})",
                old.args.len(),
                new.args.len()
            );
        } else {
            for (i, (a, b)) in old.args.iter().zip(&new.args).enumerate() {
                if !a.same_as(b) {
                    let _ = writeln!(reason, "* arg #{i} changed");
                    let _ = writeln!(reason, "  - old: {}", a.describe());
                    let _ = writeln!(reason, "  - new: {}", b.describe());
                }
            }
        }

        for (key, value) in &old.kwargs {
            match new.kwargs.get(key) {
                None => {
                    let _ = writeln!(reason, "* kwarg \"{key}\" not found");
                }
                Some(other) if !value.same_as(other) => {
                    let _ = writeln!(reason, "* argument \"{key}\" changed");
                    let _ = writeln!(reason, "  - old: {}", value.describe());
                    let _ = writeln!(reason, "  - new: {}", other.describe());
                }
                Some(_) => {}
            }
        }
        for key in new.kwargs.keys().filter(|k| !old.kwargs.contains_key(*k)) {
            let _ = writeln!(reason, "* kwarg \"{key}\" added");
        }

        Some(reason.trim_end().to_string())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.function)?;
        let mut first = true;
        for a in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            f.write_str(&a.describe())?;
        }
        for (k, v) in &self.kwargs {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{k}={}", v.describe())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
