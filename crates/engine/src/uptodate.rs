// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staleness resolution.
//!
//! Decides whether a job's stored result is still valid, recursively over
//! its children. Results are memoized for the lifetime of one resolver, so a
//! resolver must not outlive a change to the graph or to any cache.

use crate::error::EngineError;
use crate::graph::JobGraph;
use mk_core::{CacheState, JobId};
use std::collections::{HashMap, HashSet};

/// Outcome of a staleness check: whether the job is up to date, and if not,
/// a human-readable reason.
pub type Verdict = (bool, String);

pub struct UpToDate<'a> {
    graph: &'a JobGraph,
    memo: HashMap<JobId, Verdict>,
    visiting: HashSet<JobId>,
}

impl<'a> UpToDate<'a> {
    pub fn new(graph: &'a JobGraph) -> Self {
        Self { graph, memo: HashMap::new(), visiting: HashSet::new() }
    }

    /// Check one job.
    ///
    /// A `DONE` job with a stale child is marked `BLOCKED` in the store as a
    /// side effect, so its old result is never mistaken for a valid one. A
    /// `BLOCKED` job whose children turn out fresh again goes back to `DONE`.
    pub fn check(&mut self, id: &JobId) -> Result<Verdict, EngineError> {
        if let Some(verdict) = self.memo.get(id) {
            return Ok(verdict.clone());
        }
        if !self.visiting.insert(id.clone()) {
            return Err(EngineError::Bug(format!("dependency cycle through {id}")));
        }
        let verdict = self.resolve(id);
        self.visiting.remove(id);
        let verdict = verdict?;
        self.memo.insert(id.clone(), verdict.clone());
        Ok(verdict)
    }

    fn resolve(&mut self, id: &JobId) -> Result<Verdict, EngineError> {
        let graph = self.graph;
        let job = graph.get(id)?;
        let db = graph.db();
        let mut cache = db.cache(id)?;

        match cache.state {
            CacheState::NotStarted => return Ok(stale("never run")),
            CacheState::Failed => return Ok(stale("previously failed")),
            CacheState::Blocked | CacheState::Done => {}
        }

        for child in &job.children {
            let (ok, _) = self.check(child)?;
            if !ok {
                if cache.state == CacheState::Done {
                    cache.block();
                    db.set_cache(id, &cache)?;
                    tracing::debug!(job_id = %id, child = %child, "blocked by stale child");
                }
                return Ok(stale(format!("child {child} is not up to date")));
            }
        }

        if cache.remake_requested() {
            return Ok(stale("remake requested"));
        }
        if !db.result_exists(id)? {
            return Ok(stale("result missing"));
        }

        for child in &job.children {
            let timestamp = db.cache(child)?.timestamp;
            if timestamp > cache.timestamp {
                return Ok(stale(format!("child {child} was updated")));
            }
        }

        let Some(recorded) = &cache.recorded else {
            return Ok(stale("no recorded definition"));
        };
        if let Some(reason) = recorded.diff(&job.definition()) {
            return Ok(stale(reason));
        }
        if cache.state == CacheState::Blocked {
            cache.state = CacheState::Done;
            db.set_cache(id, &cache)?;
            tracing::debug!(job_id = %id, "blocked job is up to date again");
        }
        Ok((true, String::new()))
    }
}

fn stale(reason: impl Into<String>) -> Verdict {
    (false, reason.into())
}

#[cfg(test)]
#[path = "uptodate_tests.rs"]
mod tests;
