// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    definition = { RecordKind::Definition, "a:definition" },
    cache      = { RecordKind::Cache,      "a:cache" },
    result     = { RecordKind::Result,     "a:result" },
    result_tmp = { RecordKind::ResultTmp,  "a:result_tmp" },
)]
fn key_layout(kind: RecordKind, expected: &str) {
    let key = record_key(&JobId::new("a"), kind);
    assert_eq!(key, expected);
    assert_eq!(parse_key(&key), Some((JobId::new("a"), kind)));
    assert_eq!(kind.to_string(), kind.suffix());
}

#[test]
fn parse_key_allows_colons_in_ids() {
    assert_eq!(
        parse_key("ns:job:cache"),
        Some((JobId::new("ns:job"), RecordKind::Cache))
    );
}

#[yare::parameterized(
    no_separator   = { "plain" },
    unknown_suffix = { "a:other" },
    empty_id       = { ":cache" },
)]
fn parse_key_rejects(key: &str) {
    assert_eq!(parse_key(key), None);
}
