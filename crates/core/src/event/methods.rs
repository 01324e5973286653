// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event methods — name, log summary, job_id

use super::Event;
use crate::id::JobId;

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ManagerStarted { .. } => "manager:started",
            Event::JobStarting { .. } => "job:starting",
            Event::JobSucceeded { .. } => "job:succeeded",
            Event::JobFailed { .. } => "job:failed",
            Event::JobBlocked { .. } => "job:blocked",
            Event::JobInterrupted { .. } => "job:interrupted",
            Event::JobExpanded { .. } => "job:expanded",
            Event::ManagerFinished { .. } => "manager:finished",
        }
    }

    /// One-line `key=value` summary for logs.
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::ManagerStarted { targets, todo, parallelism } => {
                format!("{t} targets={} todo={todo} parallelism={parallelism}", targets.len())
            }
            Event::JobStarting { id } | Event::JobInterrupted { id } => format!("{t} job={id}"),
            Event::JobSucceeded { id, walltime } => format!("{t} job={id} walltime={walltime:.3}"),
            Event::JobFailed { id, reason } => format!("{t} job={id} reason={reason}"),
            Event::JobBlocked { id, blocking } => format!("{t} job={id} blocking={blocking}"),
            Event::JobExpanded { id, defined } => {
                format!("{t} job={id} defined={}", defined.len())
            }
            Event::ManagerFinished { succeeded, failed, blocked } => {
                format!("{t} succeeded={succeeded} failed={failed} blocked={blocked}")
            }
        }
    }

    /// The job this event is about, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Event::JobStarting { id }
            | Event::JobSucceeded { id, .. }
            | Event::JobFailed { id, .. }
            | Event::JobBlocked { id, .. }
            | Event::JobInterrupted { id }
            | Event::JobExpanded { id, .. } => Some(id),
            Event::ManagerStarted { .. } | Event::ManagerFinished { .. } => None,
        }
    }
}
