// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical key scheme: `<job_id>:<record kind>`.

use mk_core::JobId;

/// The four records a job can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// The job as declared
    Definition,
    /// Run state
    Cache,
    /// Result of the last successful run
    Result,
    /// Result of a run still waiting on the jobs it declared
    ResultTmp,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] =
        [RecordKind::Definition, RecordKind::Cache, RecordKind::Result, RecordKind::ResultTmp];

    pub fn suffix(self) -> &'static str {
        match self {
            RecordKind::Definition => "definition",
            RecordKind::Cache => "cache",
            RecordKind::Result => "result",
            RecordKind::ResultTmp => "result_tmp",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == s)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

pub fn record_key(id: &JobId, kind: RecordKind) -> String {
    format!("{id}:{}", kind.suffix())
}

/// Split a store key back into job id and record kind.
///
/// Job ids may themselves contain `:`, so only the last separator counts.
pub fn parse_key(key: &str) -> Option<(JobId, RecordKind)> {
    let (id, suffix) = key.rsplit_once(':')?;
    if id.is_empty() {
        return None;
    }
    Some((JobId::new(id), RecordKind::from_suffix(suffix)?))
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
