// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager tests drive full `execute` calls through a [`Session`] over an
//! in-memory store.

use super::*;
use crate::context::JobSpec;
use crate::hooks::FakeEventSink;
use crate::invocation::Invocation;
use crate::session::Session;
use mk_core::test_support::ids;
use mk_core::{Cache, Command, FakeClock};
use mk_storage::MemoryStore;
use std::sync::Arc;

mod dynamic;
mod failures;
mod interrupt;
mod ordering;

/// Functions every test registry starts with.
fn registry() -> Registry {
    Registry::new()
        .with("value", |inv| Ok(inv.arg(0)?.clone()))
        .with("sum", |inv| Ok(Value::Int(inv.args().iter().filter_map(Value::as_int).sum())))
        .with("len", |inv| {
            let len = inv.arg(0)?.as_list().map_or(0, <[Value]>::len);
            Ok(Value::Int(len as i64))
        })
        .with("fail", |inv| anyhow::bail!("{} failed on purpose", inv.id()))
        .with("panic", |_| panic!("kaboom"))
        .with("fanout", fanout)
}

/// Declare one `value` job per name in the `names` keyword argument and
/// return their promises.
fn fanout(inv: &mut Invocation) -> anyhow::Result<Value> {
    let names: Vec<String> = inv
        .kwarg("names")
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let context = inv.context()?;
    let mut promises = Vec::new();
    for name in names {
        let handle = context
            .define_dynamic_job(JobSpec::new(name.as_str(), Command::new("value").arg(name.as_str())))?;
        promises.push(handle.promise());
    }
    Ok(Value::List(promises))
}

fn names(list: &[&str]) -> Value {
    Value::List(list.iter().map(|s| Value::from(*s)).collect())
}

struct Harness {
    store: MemoryStore,
    clock: FakeClock,
    events: FakeEventSink,
    session: Session,
}

impl Harness {
    fn new() -> Self {
        Self::with_registry(registry())
    }

    fn with_registry(registry: Registry) -> Self {
        Self::open(MemoryStore::new(), FakeClock::ticking(), registry)
    }

    fn open(store: MemoryStore, clock: FakeClock, registry: Registry) -> Self {
        let events = FakeEventSink::new();
        let session = Session::open(Arc::new(store.clone()), registry)
            .unwrap()
            .with_clock(Arc::new(clock.clone()))
            .with_events(Arc::new(events.clone()));
        Self { store, clock, events, session }
    }

    /// A new session over the same store, as a later process would see it.
    fn reopen(&self) -> Self {
        self.reopen_with(registry())
    }

    fn reopen_with(&self, registry: Registry) -> Self {
        Self::open(self.store.clone(), self.clock.clone(), registry)
    }

    fn define(&mut self, spec: JobSpec) {
        self.session.define_job(spec).unwrap();
    }

    fn value(&mut self, id: &str, value: impl Into<Value>) {
        self.define(JobSpec::new(id, Command::new("value").arg(value)));
    }

    fn sum(&mut self, id: &str, deps: &[&str]) {
        self.define(JobSpec::new(id, mk_core::test_support::command_on("sum", deps)));
    }

    async fn make(&mut self, targets: &[&str], parallelism: usize) -> Result<MakeReport, EngineError> {
        self.session.execute(&ids(targets), parallelism).await
    }

    fn cache(&self, id: &str) -> Cache {
        self.session.cache(&id.into()).unwrap()
    }

    fn state(&self, id: &str) -> CacheState {
        self.cache(id).state
    }

    fn result(&self, id: &str) -> Option<Value> {
        self.session.result(&id.into()).unwrap()
    }

    fn children(&self, id: &str) -> BTreeSet<JobId> {
        self.session.job(&id.into()).unwrap().children.clone()
    }

    fn consistency(&self) -> Vec<String> {
        self.session.check_consistency().unwrap()
    }
}

/// Index of the first event matching `name` for `id`.
fn position(events: &[Event], name: &str, id: &str) -> Option<usize> {
    events.iter().position(|e| e.name() == name && e.job_id().is_some_and(|j| j == id))
}

fn report(succeeded: &[&str], failed: &[&str], blocked: &[&str]) -> MakeReport {
    MakeReport {
        succeeded: ids(succeeded),
        failed: ids(failed),
        blocked: ids(blocked),
        not_reached: BTreeSet::new(),
    }
}
