// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mk-core: data model of the mk incremental computation engine

pub mod macros;

pub mod cache;
pub mod clock;
pub mod command;
pub mod event;
pub mod id;
pub mod job;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cache::{Cache, CacheState};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::Command;
pub use event::Event;
pub use id::{short, JobId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Definition, Job};
pub use value::Value;
