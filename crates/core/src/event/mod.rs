// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress events emitted while a session executes jobs.
//!
//! Events are purely observational: nothing in the engine reads them back, and
//! dropping every event must not change what gets built.

mod methods;

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Events published to the session's event sink.
///
/// Serializes with `{"type": "job:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "manager:started")]
    ManagerStarted { targets: BTreeSet<JobId>, todo: usize, parallelism: usize },

    #[serde(rename = "job:starting")]
    JobStarting { id: JobId },

    #[serde(rename = "job:succeeded")]
    JobSucceeded { id: JobId, walltime: f64 },

    #[serde(rename = "job:failed")]
    JobFailed { id: JobId, reason: String },

    /// A dependency failed, so this job will not run.
    #[serde(rename = "job:blocked")]
    JobBlocked { id: JobId, blocking: JobId },

    #[serde(rename = "job:interrupted")]
    JobInterrupted { id: JobId },

    /// A job declared new jobs while running and now waits for them.
    #[serde(rename = "job:expanded")]
    JobExpanded { id: JobId, defined: BTreeSet<JobId> },

    #[serde(rename = "manager:finished")]
    ManagerFinished { succeeded: usize, failed: usize, blocked: usize },
}

#[cfg(test)]
#[path = "method_tests.rs"]
mod tests;
