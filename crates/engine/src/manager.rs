// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution manager.
//!
//! Single-threaded control logic that owns the schedule of one `execute`
//! call. Per job the states are pending (not yet finished), ready (all
//! children satisfied), running (dispatched to a worker), waiting (body
//! returned and declared jobs that must finish first) and finally one of
//! succeeded, failed or blocked.
//!
//! Workers only report back; every store write and graph mutation happens
//! here, in completion order.

use crate::error::{EngineError, UserError};
use crate::graph::JobGraph;
use crate::hooks::EventSink;
use crate::registry::Registry;
use crate::uptodate::UpToDate;
use crate::worker::{Completion, Outcome, WorkItem, WorkerPool};
use mk_core::{CacheState, Clock, Event, Job, JobId, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Partition of the jobs a session touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MakeReport {
    pub succeeded: BTreeSet<JobId>,
    pub failed: BTreeSet<JobId>,
    pub blocked: BTreeSet<JobId>,
    /// Scheduled jobs that never got to run because of an interruption.
    pub not_reached: BTreeSet<JobId>,
}

/// Accounting of one body run.
#[derive(Debug, Default)]
struct Output {
    walltime: f64,
    stdout: String,
    stderr: String,
}

const INTERRUPTED: &str = "interrupted";

pub(crate) struct Manager<'a> {
    graph: &'a mut JobGraph,
    registry: &'a Registry,
    clock: &'a dyn Clock,
    events: &'a dyn EventSink,
    parallelism: usize,

    pending: BTreeSet<JobId>,
    ready: BTreeSet<JobId>,
    running: BTreeSet<JobId>,
    waiting: BTreeMap<JobId, Output>,

    succeeded: BTreeSet<JobId>,
    failed: BTreeSet<JobId>,
    blocked: BTreeSet<JobId>,
}

impl<'a> Manager<'a> {
    pub fn new(
        graph: &'a mut JobGraph,
        registry: &'a Registry,
        clock: &'a dyn Clock,
        events: &'a dyn EventSink,
        parallelism: usize,
    ) -> Self {
        Self {
            graph,
            registry,
            clock,
            events,
            parallelism: parallelism.max(1),
            pending: BTreeSet::new(),
            ready: BTreeSet::new(),
            running: BTreeSet::new(),
            waiting: BTreeMap::new(),
            succeeded: BTreeSet::new(),
            failed: BTreeSet::new(),
            blocked: BTreeSet::new(),
        }
    }

    /// Make `targets` up to date.
    ///
    /// Fails as a whole only for unknown targets, internal errors,
    /// interruption, or when at least one job failed.
    pub async fn run(
        mut self,
        targets: &BTreeSet<JobId>,
        cancel: &CancellationToken,
    ) -> Result<MakeReport, EngineError> {
        for target in targets {
            self.graph.get(target)?;
        }
        let start = Instant::now();
        self.schedule(targets.iter().cloned().collect())?;

        let todo = self.pending.len();
        self.events.emit(&Event::ManagerStarted {
            targets: targets.clone(),
            todo,
            parallelism: self.parallelism,
        });
        tracing::info!(targets = targets.len(), todo, parallelism = self.parallelism, "make started");

        let mut pool = WorkerPool::spawn(self.parallelism, self.graph.db());
        let result = self.drive(&mut pool, cancel).await;
        pool.shutdown();

        if let Err(e) = result {
            return Err(match e {
                EngineError::Interrupted { .. } => e,
                other => match self.abandon_in_flight() {
                    Ok(()) => other,
                    Err(storage) => storage,
                },
            });
        }

        let report = self.report();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.events.emit(&Event::ManagerFinished {
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            blocked: report.blocked.len(),
        });
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            elapsed_ms,
            "make finished"
        );

        if report.failed.is_empty() {
            Ok(report)
        } else {
            Err(EngineError::MakeFailed { failed: report.failed, blocked: report.blocked })
        }
    }

    async fn drive(
        &mut self,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        loop {
            if cancel.is_cancelled() {
                return Err(self.interrupt());
            }
            while self.running.len() < self.parallelism {
                let Some(id) = self.ready.pop_first() else {
                    break;
                };
                self.dispatch(&id, pool).await?;
            }
            if self.running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.interrupt()),
                completion = pool.next() => match completion {
                    Some(completion) => self.complete(completion)?,
                    None => return Err(EngineError::Bug("worker pool stopped".to_string())),
                },
            }
        }

        if !self.pending.is_empty() {
            return Err(EngineError::Bug(format!(
                "no job can make progress, still pending: {}",
                join(&self.pending)
            )));
        }
        Ok(())
    }

    /// Add every job reachable from `roots` that is not up to date.
    fn schedule(&mut self, roots: Vec<JobId>) -> Result<(), EngineError> {
        let graph: &JobGraph = self.graph;
        let mut resolver = UpToDate::new(graph);
        let mut added = Vec::new();
        let mut stack = roots;

        while let Some(id) = stack.pop() {
            if self.pending.contains(&id) || self.is_finished(&id) {
                continue;
            }
            let (ok, reason) = resolver.check(&id)?;
            if ok {
                continue;
            }
            tracing::debug!(job_id = %id, %reason, "scheduling job");
            let job = graph.get(&id)?;
            stack.extend(job.children.iter().cloned());
            self.pending.insert(id.clone());
            added.push(id);
        }
        drop(resolver);

        // A new job may depend on one that already failed in this session.
        for id in &added {
            let job = self.graph.get(id)?;
            let dead = job.children.iter().find(|c| self.failed.contains(*c) || self.blocked.contains(*c));
            if let Some(dead) = dead.cloned() {
                if self.pending.contains(id) {
                    self.block(id, &dead)?;
                    self.block_dependents(id, &dead)?;
                }
            }
        }
        for id in &added {
            self.refresh(id)?;
        }
        Ok(())
    }

    fn is_finished(&self, id: &JobId) -> bool {
        self.succeeded.contains(id) || self.failed.contains(id) || self.blocked.contains(id)
    }

    fn satisfied(&self, id: &JobId) -> bool {
        !self.pending.contains(id) && !self.failed.contains(id) && !self.blocked.contains(id)
    }

    fn children_satisfied(&self, job: &Job) -> bool {
        job.children.iter().all(|c| self.satisfied(c))
    }

    /// Move a pending job to ready once every child is satisfied.
    fn refresh(&mut self, id: &JobId) -> Result<(), EngineError> {
        if !self.pending.contains(id)
            || self.running.contains(id)
            || self.waiting.contains_key(id)
            || self.ready.contains(id)
        {
            return Ok(());
        }
        if self.children_satisfied(self.graph.get(id)?) {
            self.ready.insert(id.clone());
        }
        Ok(())
    }

    async fn dispatch(&mut self, id: &JobId, pool: &WorkerPool) -> Result<(), EngineError> {
        let job = self.graph.get(id)?;
        let Some(body) = self.registry.get(&job.command.function) else {
            let reason = format!("unknown function {:?}", job.command.function);
            return self.fail(id, reason.clone(), reason, None);
        };
        if let Some(missing) = job.command.promises().into_iter().find(|p| !self.graph.contains(p)) {
            let reason = format!("depends on deleted job {missing}");
            return self.fail(id, reason.clone(), reason, None);
        }
        let detached = job.command.promises().into_iter().find(|p| !job.children.contains(p));
        if let Some(detached) = detached {
            let reason = format!("depends on {detached}, which is no longer a dependency");
            return self.fail(id, reason.clone(), reason, None);
        }
        let item = WorkItem {
            id: id.clone(),
            command: job.command.clone(),
            body,
            context: job.needs_context.then(|| job.context_stack()),
        };

        let db = self.graph.db();
        let mut cache = db.cache(id)?;
        cache.in_progress = true;
        db.set_cache(id, &cache)?;

        self.running.insert(id.clone());
        self.events.emit(&Event::JobStarting { id: id.clone() });
        tracing::info!(job_id = %id, running = self.running.len(), "dispatching job");
        pool.dispatch(item).await
    }

    fn complete(&mut self, completion: Completion) -> Result<(), EngineError> {
        let Completion { id, outcome, walltime, stdout, stderr } = completion;
        if !self.running.remove(&id) {
            tracing::warn!(job_id = %id, "completion for a job that is not running");
            return Ok(());
        }
        let output = Output { walltime, stdout, stderr };
        match outcome {
            Outcome::Bug(msg) => Err(EngineError::Bug(format!("{id}: {msg}"))),
            Outcome::Failure { exception, backtrace } => {
                self.fail(&id, exception, backtrace, Some(output))
            }
            Outcome::Success { value, declared } => self.succeed(&id, value, declared, output),
        }
    }

    fn succeed(
        &mut self,
        id: &JobId,
        value: Value,
        declared: Vec<Job>,
        output: Output,
    ) -> Result<(), EngineError> {
        let previous = self.graph.get(id)?.spawned.clone();
        let spawned: BTreeSet<JobId> = declared.iter().map(|j| j.id.clone()).collect();

        if let Err(e) = self.merge(id, declared, &spawned) {
            return match e {
                EngineError::User(e) => {
                    let reason = format!("invalid dynamic declaration: {e}");
                    self.fail(id, reason.clone(), reason, Some(output))
                }
                other => Err(other),
            };
        }

        let orphaned: BTreeSet<&JobId> = previous.difference(&spawned).collect();
        if !orphaned.is_empty() {
            tracing::info!(job_id = %id, orphaned = %join(orphaned), "jobs no longer declared");
        }
        if previous != spawned {
            self.graph.set_spawned(id, spawned.clone())?;
        }
        if spawned.is_empty() {
            return self.finalize(id, value, output);
        }

        self.graph.db().set_result_tmp(id, &value)?;
        self.waiting.insert(id.clone(), output);
        tracing::info!(job_id = %id, defined = spawned.len(), "job expanded");
        self.events.emit(&Event::JobExpanded { id: id.clone(), defined: spawned.clone() });

        self.schedule(spawned.iter().cloned().collect())?;
        let dead = spawned.iter().find(|s| self.failed.contains(*s) || self.blocked.contains(*s));
        if let Some(dead) = dead.cloned() {
            self.block(id, &dead)?;
            return self.block_dependents(id, &dead);
        }
        self.try_finalize(id)
    }

    /// Merge a run's declarations into the graph.
    ///
    /// User errors here are the declaring job's fault and fail only that job.
    fn merge(
        &mut self,
        id: &JobId,
        declared: Vec<Job>,
        spawned: &BTreeSet<JobId>,
    ) -> Result<(), EngineError> {
        if let Some(job) = declared.iter().find(|j| !self.registry.contains(&j.command.function)) {
            return Err(UserError::UnknownFunction {
                id: job.id.clone(),
                function: job.command.function.clone(),
            }
            .into());
        }
        if let Some(looping) = self.closes_cycle(id, &declared, spawned) {
            return Err(UserError::InvalidJob {
                id: id.clone(),
                reason: format!("dependency cycle through {looping}"),
            }
            .into());
        }
        self.graph.forget_declarations_of(id);
        for job in declared {
            self.graph.define(job)?;
        }
        Ok(())
    }

    /// The first spawned job that would depend on `id` once `declared` is in
    /// the graph. Checked before anything is defined so a rejected
    /// declaration leaves no trace in the store.
    fn closes_cycle(
        &self,
        id: &JobId,
        declared: &[Job],
        spawned: &BTreeSet<JobId>,
    ) -> Option<JobId> {
        let pending: BTreeMap<&JobId, &Job> = declared.iter().map(|j| (&j.id, j)).collect();
        let children_of = |current: &JobId| -> BTreeSet<JobId> {
            let existing = self.graph.job(current);
            match pending.get(current) {
                Some(job) => {
                    let mut children = job.static_children.clone();
                    if let Some(existing) = existing {
                        children.extend(existing.spawned.iter().cloned());
                        for (key, extra) in &existing.dynamic_children {
                            if job.static_children.contains(key) {
                                children.extend(extra.iter().cloned());
                            }
                        }
                    }
                    children
                }
                None => existing.map(|j| j.children.clone()).unwrap_or_default(),
            }
        };

        spawned
            .iter()
            .find(|start| {
                let mut seen = BTreeSet::new();
                let mut stack = vec![(*start).clone()];
                while let Some(current) = stack.pop() {
                    if current == *id {
                        return true;
                    }
                    if seen.insert(current.clone()) {
                        stack.extend(children_of(&current));
                    }
                }
                false
            })
            .cloned()
    }

    fn try_finalize(&mut self, id: &JobId) -> Result<(), EngineError> {
        if !self.waiting.contains_key(id) || !self.children_satisfied(self.graph.get(id)?) {
            return Ok(());
        }
        let output = self.waiting.remove(id).unwrap_or_default();
        let value = self
            .graph
            .db()
            .result_tmp(id)?
            .ok_or_else(|| EngineError::Bug(format!("{id}: temporary result missing")))?;
        self.finalize(id, value, output)
    }

    /// Record success: result first, then the cache that points at it.
    fn finalize(&mut self, id: &JobId, value: Value, output: Output) -> Result<(), EngineError> {
        let db = self.graph.db();
        db.set_result(id, &value)?;
        db.delete_result_tmp(id)?;

        let job = self.graph.get(id)?;
        let mut cache = db.cache(id)?;
        cache.state = CacheState::Done;
        cache.timestamp = self.clock.epoch_secs();
        cache.in_progress = false;
        cache.walltime_used = Some(output.walltime);
        cache.jobs_defined = job.spawned.clone();
        cache.exception = None;
        cache.backtrace = None;
        cache.captured_stdout = non_empty(output.stdout);
        cache.captured_stderr = non_empty(output.stderr);
        cache.recorded = Some(job.definition());
        db.set_cache(id, &cache)?;

        let parents = job.parents.clone();
        self.pending.remove(id);
        self.succeeded.insert(id.clone());
        self.events.emit(&Event::JobSucceeded { id: id.clone(), walltime: output.walltime });
        tracing::info!(
            job_id = %id,
            elapsed_ms = (output.walltime * 1000.0) as u64,
            "job succeeded"
        );

        // Parents that declared this job statically track what it expanded to.
        let expansion = self.graph.expansion(id);
        for parent in &parents {
            if self.graph.get(parent)?.static_children.contains(id)
                && self.graph.set_dynamic_children(parent, id, expansion.clone())?
            {
                tracing::debug!(job_id = %parent, child = %id, "dynamic children updated");
            }
        }
        for parent in &parents {
            if self.waiting.contains_key(parent) {
                self.try_finalize(parent)?;
            } else {
                self.refresh(parent)?;
            }
        }
        Ok(())
    }

    fn fail(
        &mut self,
        id: &JobId,
        exception: String,
        backtrace: String,
        output: Option<Output>,
    ) -> Result<(), EngineError> {
        let db = self.graph.db();
        let mut cache = db.cache(id)?;
        cache.fail(exception.clone(), backtrace);
        if let Some(output) = output {
            cache.walltime_used = Some(output.walltime);
            cache.captured_stdout = non_empty(output.stdout);
            cache.captured_stderr = non_empty(output.stderr);
        }
        db.set_cache(id, &cache)?;
        db.delete_result_tmp(id)?;

        self.forget(id);
        self.failed.insert(id.clone());
        self.events.emit(&Event::JobFailed { id: id.clone(), reason: exception.clone() });
        tracing::warn!(job_id = %id, error = %exception, "job failed");
        self.block_dependents(id, id)
    }

    /// Block every pending job that transitively depends on `from`.
    fn block_dependents(&mut self, from: &JobId, blocking: &JobId) -> Result<(), EngineError> {
        let mut stack = vec![from.clone()];
        while let Some(current) = stack.pop() {
            let parents = self.graph.get(&current)?.parents.clone();
            for parent in parents {
                if self.pending.contains(&parent) && !self.running.contains(&parent) {
                    self.block(&parent, blocking)?;
                    stack.push(parent);
                }
            }
        }
        Ok(())
    }

    fn block(&mut self, id: &JobId, blocking: &JobId) -> Result<(), EngineError> {
        let db = self.graph.db();
        let mut cache = db.cache(id)?;
        cache.block();
        db.set_cache(id, &cache)?;
        db.delete_result_tmp(id)?;

        self.forget(id);
        self.blocked.insert(id.clone());
        self.events.emit(&Event::JobBlocked { id: id.clone(), blocking: blocking.clone() });
        tracing::info!(job_id = %id, blocking = %blocking, "job blocked");
        Ok(())
    }

    fn forget(&mut self, id: &JobId) {
        self.pending.remove(id);
        self.ready.remove(id);
        self.running.remove(id);
        self.waiting.remove(id);
    }

    fn interrupt(&mut self) -> EngineError {
        if let Err(e) = self.abandon_in_flight() {
            return e;
        }
        let report = self.report();
        tracing::warn!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            not_reached = report.not_reached.len(),
            "make interrupted"
        );
        EngineError::Interrupted { report }
    }

    /// Mark every running or waiting job as failed; their late results are
    /// never applied.
    fn abandon_in_flight(&mut self) -> Result<(), EngineError> {
        let in_flight: Vec<JobId> =
            self.running.iter().chain(self.waiting.keys()).cloned().collect();
        let db = self.graph.db().clone();
        for id in in_flight {
            let mut cache = db.cache(&id)?;
            cache.fail(INTERRUPTED, "interrupted while running");
            db.set_cache(&id, &cache)?;
            db.delete_result_tmp(&id)?;

            self.forget(&id);
            self.failed.insert(id.clone());
            self.events.emit(&Event::JobInterrupted { id: id.clone() });
            tracing::warn!(job_id = %id, "job interrupted");
        }
        Ok(())
    }

    fn report(&self) -> MakeReport {
        MakeReport {
            succeeded: self.succeeded.clone(),
            failed: self.failed.clone(),
            blocked: self.blocked.clone(),
            not_reached: self.pending.clone(),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn join<'i>(ids: impl IntoIterator<Item = &'i JobId>) -> String {
    ids.into_iter().map(JobId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[path = "manager_tests/mod.rs"]
mod tests;
