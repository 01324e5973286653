// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job graph, written through to the store.
//!
//! The graph owns every [`Job`] known to a session. `children` is the source
//! of truth; `parents` is an index rebuilt on load and maintained on every
//! mutation. Only the session (and the manager it drives) mutates the graph.

use crate::error::{EngineError, UserError};
use mk_core::{CacheState, Job, JobId};
use mk_storage::{JobDb, StorageError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What to do with the parents of a job being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse when anything depends on the job.
    Strict,
    /// Remove the job from its parents' children and keep the parents.
    Detach,
    /// Delete every job that transitively depends on it too.
    Cascade,
}

pub struct JobGraph {
    db: JobDb,
    jobs: BTreeMap<JobId, Job>,
    /// Jobs declared during this session, with the id of their declarer.
    declared: HashMap<JobId, JobId>,
}

impl JobGraph {
    /// Load every stored job definition and rebuild the parent index.
    pub fn load(db: JobDb) -> Result<Self, StorageError> {
        let mut jobs = BTreeMap::new();
        for id in db.job_ids()? {
            if let Some(mut job) = db.job(&id)? {
                job.parents.clear();
                jobs.insert(id, job);
            }
        }
        let mut graph = Self { db, jobs, declared: HashMap::new() };
        graph.rebuild_parents();
        tracing::debug!(jobs = graph.jobs.len(), "loaded job graph");
        Ok(graph)
    }

    fn rebuild_parents(&mut self) {
        let edges: Vec<(JobId, JobId)> = self
            .jobs
            .values()
            .flat_map(|job| job.children.iter().map(|c| (c.clone(), job.id.clone())))
            .collect();
        for job in self.jobs.values_mut() {
            job.parents.clear();
        }
        for (child, parent) in edges {
            if let Some(job) = self.jobs.get_mut(&child) {
                job.parents.insert(parent);
            }
        }
    }

    pub fn db(&self) -> &JobDb {
        &self.db
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn get(&self, id: &JobId) -> Result<&Job, UserError> {
        self.jobs.get(id).ok_or_else(|| UserError::NotFound(id.clone()))
    }

    pub fn all_ids(&self) -> BTreeSet<JobId> {
        self.jobs.keys().cloned().collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Declare a job, or re-declare an existing one.
    ///
    /// An identical re-declaration changes nothing. A different one is
    /// rejected if the job was already declared during this session by
    /// another declarer; otherwise it replaces the stored definition while
    /// keeping what the job discovered dynamically. Cache and result records
    /// are never touched here.
    pub fn define(&mut self, mut job: Job) -> Result<(), EngineError> {
        let declarer = job.defined_by.last().cloned().unwrap_or_else(JobId::root);

        if let Some(existing) = self.jobs.get(&job.id) {
            if existing.same_declaration(&job) {
                self.declared.insert(job.id.clone(), declarer);
                return Ok(());
            }
            if self.declared.contains_key(&job.id) {
                return Err(UserError::DuplicateJob(job.id).into());
            }
            job.dynamic_children = existing
                .dynamic_children
                .iter()
                .filter(|(key, _)| job.static_children.contains(*key))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            job.spawned = existing.spawned.clone();
            job.recompute_children();
        }

        if let Some(missing) = job.static_children.iter().find(|c| !self.jobs.contains_key(*c)) {
            return Err(UserError::InvalidJob {
                id: job.id.clone(),
                reason: format!("unknown dependency {missing}"),
            }
            .into());
        }
        if job.children.iter().any(|c| *c == job.id || self.reaches(c, &job.id)) {
            return Err(UserError::InvalidJob {
                id: job.id.clone(),
                reason: "dependency cycle".to_string(),
            }
            .into());
        }

        let replaced = self.jobs.contains_key(&job.id);
        tracing::debug!(job_id = %job.id, replaced, declarer = %declarer, "defining job");
        self.declared.insert(job.id.clone(), declarer);
        self.store(job)?;
        Ok(())
    }

    /// Allow the jobs a declarer produced earlier this session to be
    /// re-declared differently by its next run.
    pub fn forget_declarations_of(&mut self, declarer: &JobId) {
        self.declared.retain(|_, by| by != declarer);
    }

    /// Persist `job` and bring the parent index in line with its children.
    fn store(&mut self, mut job: Job) -> Result<(), StorageError> {
        let (old_children, parents) = match self.jobs.get(&job.id) {
            Some(old) => (old.children.clone(), old.parents.clone()),
            None => (BTreeSet::new(), BTreeSet::new()),
        };
        job.parents = parents;
        self.db.set_job(&job)?;

        for removed in old_children.difference(&job.children) {
            if let Some(child) = self.jobs.get_mut(removed) {
                child.parents.remove(&job.id);
            }
        }
        for added in job.children.difference(&old_children) {
            if let Some(child) = self.jobs.get_mut(added) {
                child.parents.insert(job.id.clone());
            }
        }
        self.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Apply `f` to a job, then recompute its children and persist it.
    fn update(&mut self, id: &JobId, f: impl FnOnce(&mut Job)) -> Result<(), EngineError> {
        let mut job = self.get(id)?.clone();
        f(&mut job);
        job.recompute_children();
        self.store(job)?;
        Ok(())
    }

    /// Replace the set of jobs `id` declared during its last run.
    pub fn set_spawned(&mut self, id: &JobId, spawned: BTreeSet<JobId>) -> Result<(), EngineError> {
        self.update(id, |job| job.spawned = spawned)
    }

    /// Record what the expansion of `parent`'s static child `key` produced.
    ///
    /// Returns whether anything changed.
    pub fn set_dynamic_children(
        &mut self,
        parent: &JobId,
        key: &JobId,
        produced: BTreeSet<JobId>,
    ) -> Result<bool, EngineError> {
        let job = self.get(parent)?;
        let current = job.dynamic_children.get(key);
        if current == Some(&produced) || (current.is_none() && produced.is_empty()) {
            return Ok(false);
        }
        self.update(parent, |job| {
            if produced.is_empty() {
                job.dynamic_children.remove(key);
            } else {
                job.dynamic_children.insert(key.clone(), produced);
            }
        })?;
        Ok(true)
    }

    /// Every job transitively declared by runs of `id`.
    pub fn expansion(&self, id: &JobId) -> BTreeSet<JobId> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<&JobId> = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(job) = self.jobs.get(current) {
                for spawned in &job.spawned {
                    if out.insert(spawned.clone()) {
                        stack.push(spawned);
                    }
                }
            }
        }
        out.remove(id);
        out
    }

    /// Whether `to` is reachable from `from` over children edges.
    pub fn reaches(&self, from: &JobId, to: &JobId) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(job) = self.jobs.get(current) {
                stack.extend(job.children.iter());
            }
        }
        false
    }

    /// Every job that transitively depends on `id`, excluding `id`.
    pub fn dependents(&self, id: &JobId) -> BTreeSet<JobId> {
        let mut out = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(job) = self.jobs.get(current) {
                for parent in &job.parents {
                    if out.insert(parent.clone()) {
                        stack.push(parent);
                    }
                }
            }
        }
        out.remove(id);
        out
    }

    /// Delete a job and every record it owns.
    ///
    /// Returns the ids actually deleted (more than one under
    /// [`DeletePolicy::Cascade`]).
    pub fn delete(&mut self, id: &JobId, policy: DeletePolicy) -> Result<BTreeSet<JobId>, EngineError> {
        let job = self.get(id)?;
        let victims: BTreeSet<JobId> = match policy {
            DeletePolicy::Strict if !job.parents.is_empty() => {
                return Err(UserError::HasDependents {
                    id: id.clone(),
                    dependents: job.parents.clone(),
                }
                .into());
            }
            DeletePolicy::Strict | DeletePolicy::Detach => BTreeSet::from([id.clone()]),
            DeletePolicy::Cascade => {
                let mut all = self.dependents(id);
                all.insert(id.clone());
                all
            }
        };

        for victim in &victims {
            self.remove_one(victim)?;
        }
        tracing::info!(job_id = %id, deleted = victims.len(), ?policy, "deleted jobs");
        Ok(victims)
    }

    fn remove_one(&mut self, id: &JobId) -> Result<(), EngineError> {
        let Some(job) = self.jobs.remove(id) else {
            return Ok(());
        };
        self.declared.remove(id);

        for parent in &job.parents {
            if self.jobs.contains_key(parent) {
                self.update(parent, |p| {
                    p.static_children.remove(id);
                    p.spawned.remove(id);
                    p.dynamic_children.remove(id);
                    for produced in p.dynamic_children.values_mut() {
                        produced.remove(id);
                    }
                    p.dynamic_children.retain(|_, produced| !produced.is_empty());
                })?;
            }
        }
        for child in &job.children {
            if let Some(c) = self.jobs.get_mut(child) {
                c.parents.remove(id);
            }
        }
        self.db.delete_all(id)?;
        Ok(())
    }

    /// Ids matching a shell glob, or every id when no pattern is given.
    ///
    /// An exact id always matches itself, even if it contains glob syntax.
    pub fn list_ids(&self, pattern: Option<&str>) -> Result<BTreeSet<JobId>, UserError> {
        let Some(pattern) = pattern else {
            return Ok(self.all_ids());
        };
        if let Some((id, _)) = self.jobs.get_key_value(pattern) {
            return Ok(BTreeSet::from([id.clone()]));
        }
        let glob = glob::Pattern::new(pattern).map_err(|e| UserError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let matched: BTreeSet<JobId> =
            self.jobs.keys().filter(|id| glob.matches(id.as_str())).cloned().collect();
        if matched.is_empty() {
            return Err(UserError::NoMatch(pattern.to_string()));
        }
        Ok(matched)
    }

    /// Check the structural invariants, returning one line per problem.
    pub fn check_consistency(&self) -> Result<Vec<String>, StorageError> {
        let mut problems = Vec::new();
        let mut expected: HashMap<&JobId, BTreeSet<&JobId>> = HashMap::new();

        for job in self.jobs.values() {
            for child in &job.children {
                if self.jobs.contains_key(child) {
                    expected.entry(child).or_default().insert(&job.id);
                } else {
                    problems.push(format!("{}: child {child} does not exist", job.id));
                }
            }
            if !job.defined_by.first().is_some_and(|first| first.is_root()) {
                problems.push(format!("{}: defined_by does not start at root", job.id));
            }
        }

        for job in self.jobs.values() {
            let actual: BTreeSet<&JobId> = job.parents.iter().collect();
            let wanted = expected.remove(&job.id).unwrap_or_default();
            if actual != wanted {
                problems.push(format!("{}: parents index out of date", job.id));
            }
            let done = self.db.cache_exists(&job.id)?
                && self.db.cache(&job.id)?.state == CacheState::Done;
            if done && !self.db.result_exists(&job.id)? {
                problems.push(format!("{}: done without a result", job.id));
            }
        }
        Ok(problems)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
