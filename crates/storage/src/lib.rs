// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistence layer for mk.
//!
//! The engine only needs a flat key-value store with atomic per-key writes.
//! [`JobDb`] layers the four per-job record kinds on top of any [`Store`].

mod db;
mod fs;
mod keys;
mod memory;

pub use db::JobDb;
pub use fs::FsStore;
pub use keys::{parse_key, record_key, RecordKind};
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error for {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Flat key-value persistence contract.
///
/// Implementations must make each `set` atomic for its key: a concurrent or
/// interrupted write leaves either the old or the new bytes, never a mix.
/// No ordering is guaranteed across different keys.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn exists(&self, key: &str) -> Result<bool, StorageError>;
    /// Remove a key; removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}
