// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Command, JobId};
use std::collections::BTreeSet;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core value types.
pub mod strategies {
    use crate::cache::CacheState;
    use crate::value::Value;
    use proptest::prelude::*;

    pub fn arb_cache_state() -> impl Strategy<Value = CacheState> {
        prop_oneof![
            Just(CacheState::NotStarted),
            Just(CacheState::Failed),
            Just(CacheState::Blocked),
            Just(CacheState::Done),
        ]
    }

    /// Values that are comparable with themselves (no NaN, no opaque).
    pub fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-z0-9 ]{0,12}".prop_map(Value::Str),
            "[a-z]{1,6}".prop_map(Value::promise),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }
}

// ── Factory functions ─────────────────────────────────────────────────

pub fn ids(list: &[&str]) -> BTreeSet<JobId> {
    list.iter().map(|s| JobId::new(*s)).collect()
}

/// Command for function `f` taking one promise per dependency.
pub fn command_on(function: &str, deps: &[&str]) -> Command {
    deps.iter().fold(Command::new(function), |cmd, dep| cmd.arg(crate::Value::promise(*dep)))
}
