// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions.

use crate::command::Command;
use crate::id::JobId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// A declared unit of computation.
///
/// A job only describes *what* to compute; its run state lives in
/// [`crate::Cache`], stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Every job whose result this job depends on: the static children plus
    /// everything discovered dynamically.
    pub children: BTreeSet<JobId>,
    /// Inverse of `children` across the whole graph. Derived; never persisted.
    #[serde(skip)]
    pub parents: BTreeSet<JobId>,
    pub command: Command,
    #[serde(default)]
    pub needs_context: bool,
    /// Stack of enclosing dynamic contexts; always starts with the root sentinel.
    pub defined_by: Vec<JobId>,
    /// Children as declared.
    pub static_children: BTreeSet<JobId>,
    /// For each static child, the jobs its dynamic expansion produced.
    #[serde(default)]
    pub dynamic_children: BTreeMap<JobId, BTreeSet<JobId>>,
    /// Jobs declared by this job's own last execution.
    #[serde(default)]
    pub spawned: BTreeSet<JobId>,
}

impl Job {
    /// Create a job with the given static children.
    ///
    /// Every promise referenced by the command is added to the children; an
    /// empty `defined_by` is replaced by the root sentinel.
    pub fn new(
        id: impl Into<JobId>,
        children: impl IntoIterator<Item = JobId>,
        command: Command,
        mut defined_by: Vec<JobId>,
        needs_context: bool,
    ) -> Self {
        let mut static_children: BTreeSet<JobId> = children.into_iter().collect();
        static_children.extend(command.promises());
        if defined_by.is_empty() {
            defined_by.push(JobId::root());
        }
        let mut job = Self {
            id: id.into(),
            children: BTreeSet::new(),
            parents: BTreeSet::new(),
            command,
            needs_context,
            defined_by,
            static_children,
            dynamic_children: BTreeMap::new(),
            spawned: BTreeSet::new(),
        };
        job.recompute_children();
        job
    }

    /// Rebuild `children` from its three sources.
    pub fn recompute_children(&mut self) {
        let mut children = self.static_children.clone();
        children.extend(self.spawned.iter().cloned());
        for extra in self.dynamic_children.values() {
            children.extend(extra.iter().cloned());
        }
        self.children = children;
    }

    /// The part of a job that a re-declaration must match.
    pub fn same_declaration(&self, other: &Job) -> bool {
        self.command.same_as(&other.command)
            && self.static_children == other.static_children
            && self.needs_context == other.needs_context
    }

    /// Whether this job was declared by another job while it ran.
    pub fn is_dynamic(&self) -> bool {
        self.defined_by.len() > 1
    }

    /// The id of the job whose execution declared this one, if any.
    pub fn declared_by(&self) -> Option<&JobId> {
        if self.is_dynamic() {
            self.defined_by.last()
        } else {
            None
        }
    }

    /// Snapshot of what a successful run was computed from.
    pub fn definition(&self) -> Definition {
        Definition {
            command: self.command.clone(),
            static_children: self.static_children.clone(),
            dynamic_children: self.dynamic_children.clone(),
        }
    }

    /// `defined_by` stack for jobs this job declares while running.
    pub fn context_stack(&self) -> Vec<JobId> {
        let mut stack = self.defined_by.clone();
        stack.push(self.id.clone());
        stack
    }
}

/// The inputs a job was last computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub command: Command,
    pub static_children: BTreeSet<JobId>,
    #[serde(default)]
    pub dynamic_children: BTreeMap<JobId, BTreeSet<JobId>>,
}

impl Definition {
    /// Describe how `current` differs from this recorded definition.
    pub fn diff(&self, current: &Definition) -> Option<String> {
        let mut reason = Command::diff(&self.command, &current.command).unwrap_or_default();

        if self.static_children != current.static_children {
            push_line(&mut reason, "* dependencies changed");
            describe_sets(&mut reason, &self.static_children, &current.static_children);
        }

        let keys: BTreeSet<&JobId> =
            self.dynamic_children.keys().chain(current.dynamic_children.keys()).collect();
        let empty = BTreeSet::new();
        for key in keys {
            let old = self.dynamic_children.get(key).unwrap_or(&empty);
            let new = current.dynamic_children.get(key).unwrap_or(&empty);
            if old != new {
                push_line(&mut reason, &format!("* jobs generated by \"{key}\" changed"));
                describe_sets(&mut reason, old, new);
            }
        }

        if reason.is_empty() {
            None
        } else {
            Some(reason)
        }
    }
}

fn push_line(reason: &mut String, line: &str) {
    if !reason.is_empty() {
        reason.push('\n');
    }
    reason.push_str(line);
}

fn describe_sets(reason: &mut String, old: &BTreeSet<JobId>, new: &BTreeSet<JobId>) {
    let added: Vec<&str> = new.difference(old).map(JobId::as_str).collect();
    let removed: Vec<&str> = old.difference(new).map(JobId::as_str).collect();
    if !added.is_empty() {
        let _ = write!(reason, "\n  - added: {}", added.join(", "));
    }
    if !removed.is_empty() {
        let _ = write!(reason, "\n  - removed: {}", removed.join(", "));
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "test-job",
            command: Command = Command::new("noop"),
        }
        set {
            children: BTreeSet<JobId> = BTreeSet::new(),
            parents: BTreeSet<JobId> = BTreeSet::new(),
            needs_context: bool = false,
            defined_by: Vec<JobId> = vec![JobId::root()],
            static_children: BTreeSet<JobId> = BTreeSet::new(),
            dynamic_children: BTreeMap<JobId, BTreeSet<JobId>> = BTreeMap::new(),
            spawned: BTreeSet<JobId> = BTreeSet::new(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
