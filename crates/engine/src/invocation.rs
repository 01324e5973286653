// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! What a job body receives when it runs.

use crate::context::JobContext;
use crate::error::EngineError;
use mk_core::{Command, Job, JobId, Value};
use mk_storage::JobDb;
use std::collections::BTreeMap;

/// Promise chains longer than this are treated as a bug.
const MAX_PROMISE_DEPTH: usize = 64;

/// Arguments with promises already substituted, plus capture buffers.
pub struct Invocation {
    id: JobId,
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
    stdout: String,
    stderr: String,
    context: Option<JobContext>,
}

/// Everything a finished body leaves behind besides its return value.
pub(crate) struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub declared: Vec<Job>,
}

impl Invocation {
    /// Build the invocation for `command`, resolving every promise from
    /// stored results.
    pub(crate) fn prepare(
        id: JobId,
        command: &Command,
        context: Option<JobContext>,
        db: &JobDb,
    ) -> Result<Self, EngineError> {
        let args = command.args.iter().map(|v| resolve(v, db)).collect::<Result<_, _>>()?;
        let kwargs = command
            .kwargs
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve(v, db)?)))
            .collect::<Result<_, EngineError>>()?;
        Ok(Self { id, args, kwargs, stdout: String::new(), stderr: String::new(), context })
    }

    /// An invocation with literal arguments, for exercising job bodies
    /// directly.
    #[cfg(any(test, feature = "test-support"))]
    pub fn detached(
        id: impl Into<JobId>,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
        with_context: bool,
    ) -> Self {
        let id = id.into();
        let context = with_context.then(|| JobContext::new(vec![JobId::root(), id.clone()]));
        Self { id, args, kwargs, stdout: String::new(), stderr: String::new(), context }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    pub fn arg(&self, index: usize) -> anyhow::Result<&Value> {
        self.args.get(index).ok_or_else(|| {
            anyhow::anyhow!("{}: missing argument #{index} (got {})", self.id, self.args.len())
        })
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Append a line to the captured stdout.
    pub fn print(&mut self, line: impl AsRef<str>) {
        self.stdout.push_str(line.as_ref());
        self.stdout.push('\n');
    }

    /// Append a line to the captured stderr.
    pub fn eprint(&mut self, line: impl AsRef<str>) {
        self.stderr.push_str(line.as_ref());
        self.stderr.push('\n');
    }

    /// Handle for declaring further jobs; only present for jobs declared
    /// with `needs_context`.
    pub fn context(&mut self) -> anyhow::Result<&mut JobContext> {
        let id = &self.id;
        self.context.as_mut().ok_or_else(|| anyhow::anyhow!("job {id} does not take a context"))
    }

    pub(crate) fn finish(self) -> Captured {
        Captured {
            stdout: self.stdout,
            stderr: self.stderr,
            declared: self.context.map(JobContext::into_declared).unwrap_or_default(),
        }
    }
}

/// Substitute every promise in `value` with the stored result it refers to.
///
/// A result may itself contain promises (a dynamic job returning the promise
/// of a job it declared), so substitution repeats until none are left.
pub(crate) fn resolve(value: &Value, db: &JobDb) -> Result<Value, EngineError> {
    resolve_at(value, db, 0)
}

fn resolve_at(value: &Value, db: &JobDb, depth: usize) -> Result<Value, EngineError> {
    if depth > MAX_PROMISE_DEPTH {
        return Err(EngineError::Bug(format!("promise chain deeper than {MAX_PROMISE_DEPTH}")));
    }
    Ok(match value {
        Value::Promise(id) => {
            let stored = db.result(id)?.ok_or_else(|| {
                EngineError::Bug(format!("dependency {id} has no stored result"))
            })?;
            resolve_at(&stored, db, depth + 1)?
        }
        Value::List(items) => Value::List(
            items.iter().map(|v| resolve_at(v, db, depth)).collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), resolve_at(v, db, depth)?)))
                .collect::<Result<_, EngineError>>()?,
        ),
        other => other.clone(),
    })
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
