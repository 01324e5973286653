// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mk-engine: job graph, staleness resolution and execution.
//!
//! A [`Session`] owns a [`JobGraph`] loaded from a store. Callers declare
//! jobs with [`Session::define_job`] and make them with
//! [`Session::execute`]; jobs that take a [`JobContext`] may declare more
//! jobs while they run.

mod config;
mod context;
mod env;
mod error;
mod graph;
mod hooks;
mod invocation;
mod manager;
mod registry;
mod session;
mod uptodate;
mod worker;

pub use config::EngineConfig;
pub use context::{JobContext, JobHandle, JobSpec};
pub use error::{EngineError, UserError};
pub use graph::{DeletePolicy, JobGraph};
pub use hooks::{AlwaysYes, Confirm, EventSink, LogSink, NoopSink, StdinConfirm};
#[cfg(any(test, feature = "test-support"))]
pub use hooks::{FakeConfirm, FakeEventSink};
pub use invocation::Invocation;
pub use manager::MakeReport;
pub use registry::{JobFn, Registry};
pub use session::{Session, Summary};
pub use uptodate::{UpToDate, Verdict};

pub use tokio_util::sync::CancellationToken;
