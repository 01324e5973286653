// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job run state.

use crate::id::JobId;
use crate::job::Definition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Run state of a job, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    #[default]
    NotStarted,
    Failed,
    Blocked,
    Done,
}

impl CacheState {
    /// All states, in display order.
    pub const ALL: [CacheState; 4] =
        [CacheState::NotStarted, CacheState::Failed, CacheState::Blocked, CacheState::Done];
}

crate::simple_display! {
    CacheState {
        NotStarted => "not started",
        Failed => "failed",
        Blocked => "blocked",
        Done => "done",
    }
}

/// Run-state record of a single job.
///
/// Created lazily (in `NotStarted`) the first time a job's state is asked
/// for, and removed only when the job itself is deleted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cache {
    pub state: CacheState,
    /// Completion time in epoch seconds; [`Cache::REMAKE`] forces a rebuild.
    #[serde(default)]
    pub timestamp: f64,
    /// Set while a run is dispatched; informational only.
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cputime_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walltime_used: Option<f64>,
    /// Jobs declared by the last execution.
    #[serde(default)]
    pub jobs_defined: BTreeSet<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_stderr: Option<String>,
    /// Definition the last successful run was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded: Option<Definition>,
}

impl Cache {
    /// Timestamp sentinel meaning "remake requested".
    pub const REMAKE: f64 = 0.0;

    pub fn new(state: CacheState) -> Self {
        Self { state, ..Self::default() }
    }

    pub fn is_done(&self) -> bool {
        self.state == CacheState::Done
    }

    pub fn remake_requested(&self) -> bool {
        self.timestamp == Self::REMAKE
    }

    /// Record a failure, keeping the previous run's bookkeeping.
    pub fn fail(&mut self, exception: impl Into<String>, backtrace: impl Into<String>) {
        self.state = CacheState::Failed;
        self.in_progress = false;
        self.exception = Some(exception.into());
        self.backtrace = Some(backtrace.into());
    }

    /// Mark as blocked by a dependency.
    ///
    /// Returns whether the state changed.
    pub fn block(&mut self) -> bool {
        if self.state == CacheState::Blocked {
            return false;
        }
        self.state = CacheState::Blocked;
        self.in_progress = false;
        true
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
