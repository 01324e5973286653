// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed access to the per-job records.

use crate::keys::{parse_key, record_key, RecordKind};
use crate::{StorageError, Store};
use mk_core::{Cache, Job, JobId, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Job records over an arbitrary [`Store`], JSON-encoded.
///
/// Cheap to clone; workers get their own handle for read-only lookups.
#[derive(Clone)]
pub struct JobDb {
    store: Arc<dyn Store>,
}

impl JobDb {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn read<T: DeserializeOwned>(
        &self,
        id: &JobId,
        kind: RecordKind,
    ) -> Result<Option<T>, StorageError> {
        let key = record_key(id, kind);
        match self.store.get(&key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StorageError::Json { key, source }),
        }
    }

    fn write<T: Serialize>(
        &self,
        id: &JobId,
        kind: RecordKind,
        value: &T,
    ) -> Result<(), StorageError> {
        let key = record_key(id, kind);
        let bytes = serde_json::to_vec(value)
            .map_err(|source| StorageError::Json { key: key.clone(), source })?;
        self.store.set(&key, &bytes)
    }

    fn exists(&self, id: &JobId, kind: RecordKind) -> Result<bool, StorageError> {
        self.store.exists(&record_key(id, kind))
    }

    fn remove(&self, id: &JobId, kind: RecordKind) -> Result<(), StorageError> {
        self.store.delete(&record_key(id, kind))
    }

    // -- definition --

    pub fn job(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        self.read(id, RecordKind::Definition)
    }

    pub fn set_job(&self, job: &Job) -> Result<(), StorageError> {
        self.write(&job.id, RecordKind::Definition, job)
    }

    pub fn job_exists(&self, id: &JobId) -> Result<bool, StorageError> {
        self.exists(id, RecordKind::Definition)
    }

    // -- cache --

    /// Run state of a job, created as `NotStarted` on first access.
    pub fn cache(&self, id: &JobId) -> Result<Cache, StorageError> {
        if let Some(cache) = self.read(id, RecordKind::Cache)? {
            return Ok(cache);
        }
        let cache = Cache::default();
        self.set_cache(id, &cache)?;
        Ok(cache)
    }

    pub fn set_cache(&self, id: &JobId, cache: &Cache) -> Result<(), StorageError> {
        self.write(id, RecordKind::Cache, cache)
    }

    pub fn cache_exists(&self, id: &JobId) -> Result<bool, StorageError> {
        self.exists(id, RecordKind::Cache)
    }

    // -- results --

    pub fn result(&self, id: &JobId) -> Result<Option<Value>, StorageError> {
        self.read(id, RecordKind::Result)
    }

    pub fn set_result(&self, id: &JobId, value: &Value) -> Result<(), StorageError> {
        self.write(id, RecordKind::Result, value)
    }

    pub fn result_exists(&self, id: &JobId) -> Result<bool, StorageError> {
        self.exists(id, RecordKind::Result)
    }

    pub fn delete_result(&self, id: &JobId) -> Result<(), StorageError> {
        self.remove(id, RecordKind::Result)
    }

    pub fn result_tmp(&self, id: &JobId) -> Result<Option<Value>, StorageError> {
        self.read(id, RecordKind::ResultTmp)
    }

    pub fn set_result_tmp(&self, id: &JobId, value: &Value) -> Result<(), StorageError> {
        self.write(id, RecordKind::ResultTmp, value)
    }

    pub fn delete_result_tmp(&self, id: &JobId) -> Result<(), StorageError> {
        self.remove(id, RecordKind::ResultTmp)
    }

    /// Remove every record the job owns.
    pub fn delete_all(&self, id: &JobId) -> Result<(), StorageError> {
        for kind in RecordKind::ALL {
            self.remove(id, kind)?;
        }
        Ok(())
    }

    /// Ids of every job with a stored definition.
    pub fn job_ids(&self) -> Result<BTreeSet<JobId>, StorageError> {
        Ok(self
            .store
            .keys()?
            .iter()
            .filter_map(|key| parse_key(key))
            .filter(|(_, kind)| *kind == RecordKind::Definition)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
