// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem store: one file per key.
//!
//! Writes go to a uniquely named file under `.tmp/` and are renamed into
//! place, so readers and concurrent writers only ever see whole records.

use crate::{StorageError, Store};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const TMP_DIR: &str = ".tmp";
const ZSTD_LEVEL: i32 = 3;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    compress: bool,
}

impl FsStore {
    /// Open (creating if needed) an uncompressed store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_with(root, false)
    }

    /// Open a store whose records are zstd-compressed on disk.
    pub fn compressed(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_with(root, true)
    }

    pub fn open_with(root: impl Into<PathBuf>, compress: bool) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join(TMP_DIR))?;
        tracing::debug!(root = %root.display(), compress, "opened store");
        Ok(Self { root, compress })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(escape(key))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(TMP_DIR).join(format!("{}.{}.{n}", escape(key), std::process::id()))
    }
}

impl Store for FsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !self.compress {
            return Ok(Some(bytes));
        }
        zstd::decode_all(bytes.as_slice())
            .map(Some)
            .map_err(|e| StorageError::Corrupt { key: key.to_string(), reason: e.to_string() })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let tmp = self.tmp_path(key);
        let data = if self.compress {
            zstd::encode_all(value, ZSTD_LEVEL)?
        } else {
            value.to_vec()
        };
        let written = fs::write(&tmp, &data).and_then(|_| fs::rename(&tmp, self.path_for(key)));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key).is_file())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::warn!(file = ?entry.path(), "skipping non-utf8 file in store");
                continue;
            };
            match unescape(name) {
                Some(key) => keys.push(key),
                None => tracing::warn!(file = name, "skipping unrecognized file in store"),
            }
        }
        Ok(keys)
    }
}

/// Map a key to a portable file name.
///
/// Alphanumerics, `-` and `_` pass through; every other byte (including `.`
/// and `/`) becomes `%XX`.
fn escape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
