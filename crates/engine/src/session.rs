// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session facade: one job graph, one store, and the operations callers use.

use crate::config::EngineConfig;
use crate::context::{JobHandle, JobSpec};
use crate::error::{EngineError, UserError};
use crate::graph::{DeletePolicy, JobGraph};
use crate::hooks::{AlwaysYes, Confirm, EventSink, NoopSink, StdinConfirm};
use crate::manager::{MakeReport, Manager};
use crate::registry::Registry;
use crate::uptodate::{UpToDate, Verdict};
use mk_core::{Cache, CacheState, Clock, Job, JobId, SystemClock, Value};
use mk_storage::{JobDb, Store};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counts of jobs per state and per function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub by_state: BTreeMap<String, usize>,
    pub by_function: BTreeMap<String, usize>,
}

/// An open job database plus everything needed to run its jobs.
///
/// Each session owns its graph; two sessions never share in-memory state
/// even when they share a store.
pub struct Session {
    graph: JobGraph,
    registry: Registry,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    confirm: Arc<dyn Confirm>,
    parallelism: usize,
}

impl Session {
    /// Open a session over `store`, loading every stored job.
    pub fn open(store: Arc<dyn Store>, registry: Registry) -> Result<Self, EngineError> {
        let graph = JobGraph::load(JobDb::new(store))?;
        tracing::info!(jobs = graph.len(), functions = registry.names().len(), "session opened");
        Ok(Self {
            graph,
            registry,
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopSink),
            confirm: Arc::new(AlwaysYes),
            parallelism: 1,
        })
    }

    /// Open the configured filesystem store.
    pub fn from_config(config: &EngineConfig, registry: Registry) -> Result<Self, EngineError> {
        let store = config.open_store()?;
        let mut session = Self::open(Arc::new(store), registry)?.with_parallelism(config.parallelism);
        if config.interactive {
            session = session.with_confirm(Arc::new(StdinConfirm));
        }
        Ok(session)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Default parallelism for [`Session::make`].
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    // -- declaring --

    /// Declare a top-level job.
    pub fn define_job(&mut self, spec: JobSpec) -> Result<JobHandle, EngineError> {
        if !self.registry.contains(&spec.command.function) {
            return Err(UserError::UnknownFunction {
                id: spec.id,
                function: spec.command.function,
            }
            .into());
        }
        let job = spec.into_job(vec![JobId::root()]);
        let handle = JobHandle::new(job.id.clone());
        self.graph.define(job)?;
        Ok(handle)
    }

    // -- inspecting --

    pub fn job(&self, id: &JobId) -> Result<&Job, UserError> {
        self.graph.get(id)
    }

    pub fn cache(&self, id: &JobId) -> Result<Cache, EngineError> {
        self.graph.get(id)?;
        Ok(self.graph.db().cache(id)?)
    }

    pub fn result(&self, id: &JobId) -> Result<Option<Value>, EngineError> {
        self.graph.get(id)?;
        Ok(self.graph.db().result(id)?)
    }

    pub fn is_up_to_date(&self, id: &JobId) -> Result<Verdict, EngineError> {
        UpToDate::new(&self.graph).check(id)
    }

    pub fn list_ids(&self, pattern: Option<&str>) -> Result<BTreeSet<JobId>, UserError> {
        self.graph.list_ids(pattern)
    }

    /// Counts per cache state and per function over `ids`.
    pub fn summary(&self, ids: &BTreeSet<JobId>) -> Result<Summary, EngineError> {
        let mut summary = Summary::default();
        for state in CacheState::ALL {
            summary.by_state.insert(state.to_string(), 0);
        }
        for id in ids {
            let job = self.graph.get(id)?;
            let state = self.graph.db().cache(id)?.state;
            summary.total += 1;
            *summary.by_state.entry(state.to_string()).or_default() += 1;
            *summary.by_function.entry(job.command.function.clone()).or_default() += 1;
        }
        Ok(summary)
    }

    pub fn check_consistency(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.graph.check_consistency()?)
    }

    // -- running --

    /// Make `targets` up to date with the session's default parallelism.
    pub async fn make(&mut self, targets: &BTreeSet<JobId>) -> Result<MakeReport, EngineError> {
        self.execute(targets, self.parallelism).await
    }

    pub async fn execute(
        &mut self,
        targets: &BTreeSet<JobId>,
        parallelism: usize,
    ) -> Result<MakeReport, EngineError> {
        self.execute_until(targets, parallelism, CancellationToken::new()).await
    }

    /// Like [`Session::execute`], stopping early once `cancel` fires.
    pub async fn execute_until(
        &mut self,
        targets: &BTreeSet<JobId>,
        parallelism: usize,
        cancel: CancellationToken,
    ) -> Result<MakeReport, EngineError> {
        let manager = Manager::new(
            &mut self.graph,
            &self.registry,
            self.clock.as_ref(),
            self.events.as_ref(),
            parallelism,
        );
        manager.run(targets, &cancel).await
    }

    /// Force `targets` to run again, then make them.
    pub async fn remake(
        &mut self,
        targets: &BTreeSet<JobId>,
        parallelism: usize,
    ) -> Result<MakeReport, EngineError> {
        let question = format!("Should I clean and remake {} jobs?", targets.len());
        if !self.confirm.confirm(&question) {
            tracing::info!("remake declined");
            return Ok(MakeReport::default());
        }
        for id in targets {
            self.graph.get(id)?;
            self.mark_remake(id)?;
        }
        self.execute(targets, parallelism).await
    }

    // -- cleaning and deleting --

    /// Set the force-remake sentinel on a finished job.
    ///
    /// Returns whether anything changed.
    pub fn mark_remake(&mut self, id: &JobId) -> Result<bool, EngineError> {
        self.graph.get(id)?;
        let db = self.graph.db();
        let mut cache = db.cache(id)?;
        if cache.state != CacheState::Done {
            return Ok(false);
        }
        cache.timestamp = Cache::REMAKE;
        db.set_cache(id, &cache)?;
        tracing::debug!(job_id = %id, "remake requested");
        Ok(true)
    }

    /// Forget the results of `ids`, leaving the jobs defined.
    ///
    /// Returns the ids cleaned, empty if the confirmation hook declined.
    pub fn clean(&mut self, ids: &BTreeSet<JobId>) -> Result<BTreeSet<JobId>, EngineError> {
        for id in ids {
            self.graph.get(id)?;
        }
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        if !self.confirm.confirm(&format!("Should I clean {} jobs?", ids.len())) {
            tracing::info!(jobs = ids.len(), "clean declined");
            return Ok(BTreeSet::new());
        }
        let db = self.graph.db();
        for id in ids {
            db.set_cache(id, &Cache::default())?;
            db.delete_result(id)?;
            db.delete_result_tmp(id)?;
        }
        tracing::info!(jobs = ids.len(), "cleaned jobs");
        Ok(ids.clone())
    }

    pub fn clean_all(&mut self) -> Result<BTreeSet<JobId>, EngineError> {
        let all = self.graph.all_ids();
        self.clean(&all)
    }

    /// Delete a job nothing depends on.
    pub fn delete(&mut self, id: &JobId) -> Result<(), EngineError> {
        self.graph.delete(id, DeletePolicy::Strict)?;
        Ok(())
    }

    /// Delete a job, removing it from its parents' children.
    pub fn delete_detached(&mut self, id: &JobId) -> Result<(), EngineError> {
        self.graph.delete(id, DeletePolicy::Detach)?;
        Ok(())
    }

    /// Delete a job and everything that depends on it.
    ///
    /// Asks for confirmation when that is more than the job itself; returns
    /// the ids deleted, empty if declined.
    pub fn delete_with_dependents(&mut self, id: &JobId) -> Result<BTreeSet<JobId>, EngineError> {
        let dependents = self.graph.get(id).map(|_| self.graph.dependents(id))?;
        if !dependents.is_empty() {
            let question =
                format!("Should I delete {id} and {} jobs depending on it?", dependents.len());
            if !self.confirm.confirm(&question) {
                tracing::info!(job_id = %id, "delete declined");
                return Ok(BTreeSet::new());
            }
        }
        self.graph.delete(id, DeletePolicy::Cascade)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
