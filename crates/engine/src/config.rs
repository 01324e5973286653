// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Resolution order: defaults, then an optional TOML file, then `MK_*`
//! environment variables.

use crate::env;
use crate::error::EngineError;
use mk_core::setters;
use mk_storage::FsStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Jobs run concurrently; 1 is sequential.
    pub parallelism: usize,
    pub store_dir: PathBuf,
    /// zstd-compress stored records.
    pub compress: bool,
    /// Ask before destructive operations instead of assuming yes.
    pub interactive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            store_dir: env::default_store_dir(),
            compress: false,
            interactive: false,
        }
    }
}

impl EngineConfig {
    setters! {
        into { store_dir: PathBuf }
        set {
            parallelism: usize,
            compress: bool,
            interactive: bool,
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read a TOML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(EngineError::Config(format!("{}: {e}", path.display()))),
        }
    }

    /// Apply `MK_*` environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Some(n) = env::parallelism() {
            self.parallelism = n;
        }
        if let Some(dir) = env::store_dir() {
            self.store_dir = dir;
        }
        if let Some(compress) = env::compress() {
            self.compress = compress;
        }
        if let Some(interactive) = env::interactive() {
            self.interactive = interactive;
        }
        self
    }

    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env();
        if config.parallelism == 0 {
            return Err(EngineError::Config("parallelism must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn open_store(&self) -> Result<FsStore, EngineError> {
        let store = FsStore::open_with(&self.store_dir, self.compress)?;
        tracing::info!(dir = %self.store_dir.display(), compress = self.compress, "opened store");
        Ok(store)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
