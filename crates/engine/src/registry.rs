// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named job functions.

use crate::invocation::Invocation;
use mk_core::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A job body. Runs on a blocking worker thread.
pub type JobFn = Arc<dyn Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync>;

/// Function table consulted when a job is dispatched.
///
/// Jobs refer to their body by name only, so a stored graph can be reopened
/// by any process that registers the same names.
#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<String, JobFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    /// Builder-style [`Registry::register`].
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<JobFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("functions", &self.names()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
