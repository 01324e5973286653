// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size worker pool.
//!
//! Workers pull [`WorkItem`]s from a shared queue, run the body on tokio's
//! blocking pool and report a [`Completion`] back. They read stored results
//! to resolve promises but never write to the store or touch the graph; the
//! manager applies every outcome.

use crate::context::JobContext;
use crate::error::EngineError;
use crate::invocation::Invocation;
use crate::registry::JobFn;
use mk_core::{Command, Job, JobId, Value};
use mk_storage::JobDb;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// One job to run.
pub(crate) struct WorkItem {
    pub id: JobId,
    pub command: Command,
    pub body: JobFn,
    /// `defined_by` stack for the job's declarations; `None` when the job
    /// does not take a context.
    pub context: Option<Vec<JobId>>,
}

/// How a body ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    Success { value: Value, declared: Vec<Job> },
    Failure { exception: String, backtrace: String },
    /// The engine itself is inconsistent; aborts the session.
    Bug(String),
}

#[derive(Debug)]
pub(crate) struct Completion {
    pub id: JobId,
    pub outcome: Outcome,
    pub walltime: f64,
    pub stdout: String,
    pub stderr: String,
}

pub(crate) struct WorkerPool {
    queue: mpsc::Sender<WorkItem>,
    completions: mpsc::Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) on the current runtime.
    pub fn spawn(size: usize, db: &JobDb) -> Self {
        let size = size.max(1);
        let (queue, rx) = mpsc::channel::<WorkItem>(size);
        let (done_tx, completions) = mpsc::channel::<Completion>(size);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|index| {
                let rx = Arc::clone(&rx);
                let done_tx = done_tx.clone();
                let db = db.clone();
                tokio::spawn(async move { run_worker(index, rx, done_tx, db).await })
            })
            .collect();

        Self { queue, completions, workers }
    }

    pub async fn dispatch(&self, item: WorkItem) -> Result<(), EngineError> {
        self.queue.send(item).await.map_err(|_| EngineError::Bug("worker pool closed".to_string()))
    }

    /// Wait for the next completion, in finishing order.
    pub async fn next(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    /// Stop accepting work. Bodies already running finish on their own and
    /// their completions are dropped.
    pub fn shutdown(self) {
        drop(self.queue);
        drop(self.completions);
        drop(self.workers);
    }
}

async fn run_worker(
    index: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    done: mpsc::Sender<Completion>,
    db: JobDb,
) {
    loop {
        let item = queue.lock().await.recv().await;
        let Some(item) = item else {
            break;
        };
        tracing::debug!(worker = index, job_id = %item.id, "worker picked up job");
        let completion = run_item(item, db.clone()).await;
        if done.send(completion).await.is_err() {
            break;
        }
    }
    tracing::trace!(worker = index, "worker stopped");
}

async fn run_item(item: WorkItem, db: JobDb) -> Completion {
    let id = item.id.clone();
    let start = Instant::now();
    let joined = tokio::task::spawn_blocking(move || run_body(item, &db)).await;
    let walltime = start.elapsed().as_secs_f64();

    match joined {
        Ok((outcome, stdout, stderr)) => Completion { id, outcome, walltime, stdout, stderr },
        Err(e) => {
            let exception = if e.is_panic() {
                format!("job panicked: {}", panic_message(e.into_panic()))
            } else {
                "job cancelled".to_string()
            };
            Completion {
                id,
                outcome: Outcome::Failure { backtrace: exception.clone(), exception },
                walltime,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }
}

fn run_body(item: WorkItem, db: &JobDb) -> (Outcome, String, String) {
    let context = item.context.map(JobContext::new);
    let mut invocation = match Invocation::prepare(item.id, &item.command, context, db) {
        Ok(invocation) => invocation,
        Err(EngineError::Bug(msg)) => return (Outcome::Bug(msg), String::new(), String::new()),
        Err(e) => {
            let outcome = Outcome::Failure { exception: e.to_string(), backtrace: format!("{e:?}") };
            return (outcome, String::new(), String::new());
        }
    };

    let result = (item.body)(&mut invocation);
    let captured = invocation.finish();
    let outcome = match result {
        Ok(value) => Outcome::Success { value, declared: captured.declared },
        Err(e) => Outcome::Failure { exception: e.to_string(), backtrace: format!("{e:?}") },
    };
    (outcome, captured.stdout, captured.stderr)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
