// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument and result values.
//!
//! Values are what flows between jobs: a job's arguments are values, and so is
//! the result it returns. A [`Value::Promise`] stands for another job's result
//! and is substituted right before the job body runs.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// The (eventual) result of another job
    Promise(JobId),
    /// A value with no meaningful equality, kept only for display.
    ///
    /// Two opaque values are never considered the same, so a job taking one
    /// as an argument is always treated as changed.
    Opaque(String),
}

impl Value {
    pub fn promise(id: impl Into<JobId>) -> Self {
        Value::Promise(id.into())
    }

    /// Structural equality used for change detection.
    ///
    /// Unequal unless proven equal: opaque values never match and floats
    /// follow IEEE semantics (`NaN` differs from itself).
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.same_as(vb))
            }
            (Value::Promise(a), Value::Promise(b)) => a == b,
            _ => false,
        }
    }

    /// Collect every job id referenced by a promise, at any depth.
    pub fn collect_promises(&self, into: &mut BTreeSet<JobId>) {
        match self {
            Value::Promise(id) => {
                into.insert(id.clone());
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_promises(into)),
            Value::Map(entries) => entries.values().for_each(|v| v.collect_promises(into)),
            _ => {}
        }
    }

    /// Short human-readable description, used in change reasons.
    pub fn describe(&self) -> String {
        const MAX: usize = 60;
        let full = match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("{s:?}"),
            Value::List(items) => format!("list[{}]", items.len()),
            Value::Map(entries) => format!("map{{{}}}", entries.len()),
            Value::Promise(id) => format!("Promise({id})"),
            Value::Opaque(desc) => format!("<{desc}>"),
        };
        if full.chars().count() > MAX {
            format!("{}...", crate::id::short(&full, MAX))
        } else {
            full
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
