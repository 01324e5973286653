// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use crate::manager::MakeReport;
use mk_core::JobId;
use mk_storage::StorageError;
use std::collections::BTreeSet;
use thiserror::Error;

/// Mistakes in how the caller declared or addressed jobs.
///
/// Always reported before anything is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("job {0} already defined with a different definition")]
    DuplicateJob(JobId),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} has dependents: {}", join(dependents))]
    HasDependents { id: JobId, dependents: BTreeSet<JobId> },
    #[error("no job matches {0:?}")]
    NoMatch(String),
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("unknown function {function:?} for job {id}")]
    UnknownFunction { id: JobId, function: String },
    #[error("invalid job {id}: {reason}")]
    InvalidJob { id: JobId, reason: String },
}

/// Errors crossing the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error("make failed: {} failed, {} blocked (failed: {})", failed.len(), blocked.len(), join(failed))]
    MakeFailed { failed: BTreeSet<JobId>, blocked: BTreeSet<JobId> },
    #[error(
        "interrupted: {} succeeded, {} failed, {} not reached",
        report.succeeded.len(),
        report.failed.len(),
        report.not_reached.len()
    )]
    Interrupted { report: MakeReport },
    /// An internal invariant does not hold; never retried.
    #[error("internal error: {0}")]
    Bug(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_user(&self) -> bool {
        matches!(self, EngineError::User(_))
    }
}

fn join(ids: &BTreeSet<JobId>) -> String {
    ids.iter().map(JobId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
