// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;

/// Worker count override
pub fn parallelism() -> Option<usize> {
    std::env::var("MK_PARALLELISM").ok().and_then(|s| s.parse::<usize>().ok()).filter(|n| *n > 0)
}

/// Store directory override
pub fn store_dir() -> Option<PathBuf> {
    std::env::var("MK_STORE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Compression override (`1`/`true`/`yes` or `0`/`false`/`no`)
pub fn compress() -> Option<bool> {
    std::env::var("MK_COMPRESS").ok().and_then(|s| parse_flag(&s))
}

/// Interactive confirmation override
pub fn interactive() -> Option<bool> {
    std::env::var("MK_INTERACTIVE").ok().and_then(|s| parse_flag(&s))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default store directory: `<data dir>/mk`, or `.mk` when the platform has
/// no data directory.
pub fn default_store_dir() -> PathBuf {
    dirs::data_local_dir().map(|d| d.join("mk")).unwrap_or_else(|| PathBuf::from(".mk"))
}
