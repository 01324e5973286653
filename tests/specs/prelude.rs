// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the behavioral tests.

pub use mk_core::test_support::ids;
pub use mk_core::{CacheState, Command, FakeClock, JobId, Value};
pub use mk_engine::{
    EngineConfig, EngineError, FakeConfirm, FakeEventSink, Invocation, JobSpec, MakeReport,
    Registry, Session, UserError,
};
pub use std::sync::Arc;

use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness; `RUST_LOG=mk_engine=debug` shows them.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A throwaway project directory holding one job store.
pub struct Project {
    dir: TempDir,
    clock: FakeClock,
    pub events: FakeEventSink,
}

impl Project {
    pub fn empty() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            clock: FakeClock::ticking(),
            events: FakeEventSink::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::default().store_dir(self.path().join("store")).compress(true)
    }

    /// Open a session as a fresh process would, with the standard functions.
    pub fn session(&self) -> Session {
        self.session_with(functions())
    }

    pub fn session_with(&self, registry: Registry) -> Session {
        Session::from_config(&self.config(), registry)
            .expect("open session")
            .with_clock(Arc::new(self.clock.clone()))
            .with_events(Arc::new(self.events.clone()))
    }
}

/// Functions every job in these tests is built from.
pub fn functions() -> Registry {
    Registry::new()
        .with("value", |inv| Ok(inv.arg(0)?.clone()))
        .with("sum", |inv| Ok(Value::Int(inv.args().iter().filter_map(Value::as_int).sum())))
        .with("fail", |inv| anyhow::bail!("{} refuses to run", inv.id()))
        .with("split", split)
}

/// Declare one `value` job per item of the `parts` list.
fn split(inv: &mut Invocation) -> anyhow::Result<Value> {
    let parts = inv.kwarg("parts").and_then(Value::as_list).unwrap_or_default().to_vec();
    let owner = inv.id().clone();
    let context = inv.context()?;
    let mut promises = Vec::new();
    for (i, part) in parts.into_iter().enumerate() {
        let id = format!("{owner}-{i}");
        let handle = context.define_dynamic_job(JobSpec::new(id, Command::new("value").arg(part)))?;
        promises.push(handle.promise());
    }
    Ok(Value::List(promises))
}

pub fn value(session: &mut Session, id: &str, value: impl Into<Value>) {
    session.define_job(JobSpec::new(id, Command::new("value").arg(value))).expect("define");
}

pub fn sum(session: &mut Session, id: &str, deps: &[&str]) {
    let command = mk_core::test_support::command_on("sum", deps);
    session.define_job(JobSpec::new(id, command)).expect("define");
}

pub fn split_job(session: &mut Session, id: &str, parts: &[i64]) {
    let parts = Value::List(parts.iter().map(|p| Value::Int(*p)).collect());
    let spec = JobSpec::new(id, Command::new("split").kwarg("parts", parts)).with_context();
    session.define_job(spec).expect("define");
}

pub fn make_failed(result: Result<MakeReport, EngineError>) -> (Vec<JobId>, Vec<JobId>) {
    match result {
        Err(EngineError::MakeFailed { failed, blocked }) => {
            (failed.into_iter().collect(), blocked.into_iter().collect())
        }
        other => panic!("expected a failed make, got {other:?}"),
    }
}
