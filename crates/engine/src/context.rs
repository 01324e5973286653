// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job declarations, top-level and from inside a running job.

use crate::error::UserError;
use mk_core::{Command, Job, JobId, Value};
use std::collections::BTreeSet;

/// A job as the caller declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub id: JobId,
    pub children: BTreeSet<JobId>,
    pub command: Command,
    pub needs_context: bool,
}

impl JobSpec {
    pub fn new(id: impl Into<JobId>, command: Command) -> Self {
        Self { id: id.into(), children: BTreeSet::new(), command, needs_context: false }
    }

    /// Depend on `id` without consuming its result.
    pub fn after(mut self, id: impl Into<JobId>) -> Self {
        self.children.insert(id.into());
        self
    }

    /// Give the body a [`JobContext`] for declaring more jobs.
    pub fn with_context(mut self) -> Self {
        self.needs_context = true;
        self
    }

    pub(crate) fn into_job(self, defined_by: Vec<JobId>) -> Job {
        Job::new(self.id, self.children, self.command, defined_by, self.needs_context)
    }
}

/// Reference to a declared job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    id: JobId,
}

impl JobHandle {
    pub(crate) fn new(id: JobId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Placeholder for this job's result, usable as an argument of other
    /// jobs or as (part of) a body's return value.
    pub fn promise(&self) -> Value {
        Value::Promise(self.id.clone())
    }
}

/// Declaration handle given to a running job.
///
/// Declarations are only collected here; the manager merges them into the
/// graph once the body has returned.
#[derive(Debug)]
pub struct JobContext {
    stack: Vec<JobId>,
    declared: Vec<Job>,
}

impl JobContext {
    pub(crate) fn new(stack: Vec<JobId>) -> Self {
        Self { stack, declared: Vec::new() }
    }

    /// `defined_by` of every job declared through this context.
    pub fn stack(&self) -> &[JobId] {
        &self.stack
    }

    /// Id of the running job.
    pub fn owner(&self) -> Option<&JobId> {
        self.stack.last()
    }

    /// Declare a job from inside the running one.
    ///
    /// Declaring the same job twice is fine as long as both declarations
    /// agree.
    pub fn define_dynamic_job(&mut self, spec: JobSpec) -> Result<JobHandle, UserError> {
        let job = spec.into_job(self.stack.clone());
        if let Some(previous) = self.declared.iter().find(|j| j.id == job.id) {
            if previous.same_declaration(&job) {
                return Ok(JobHandle::new(job.id));
            }
            return Err(UserError::DuplicateJob(job.id));
        }
        if self.owner() == Some(&job.id) {
            return Err(UserError::InvalidJob {
                id: job.id,
                reason: "a job cannot declare itself".to_string(),
            });
        }
        let handle = JobHandle::new(job.id.clone());
        self.declared.push(job);
        Ok(handle)
    }

    pub fn declared(&self) -> &[Job] {
        &self.declared
    }

    pub(crate) fn into_declared(self) -> Vec<Job> {
        self.declared
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
