// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::artifact::ArtifactId;

#[test]
fn short_truncates_long_strings() {
    assert_eq!(short("abcdefgh", 4), "abcd");
}

#[test]
fn short_keeps_short_strings() {
    assert_eq!(short("abc", 4), "abc");
    assert_eq!(short("", 4), "");
}

#[test]
fn generated_ids_carry_prefix() {
    let id = ArtifactId::new();
    assert!(id.as_str().starts_with("art-"));
    assert_eq!(id.as_str().len(), 23);
}

#[test]
fn generated_ids_are_unique() {
    let a = ArtifactId::new();
    let b = ArtifactId::new();
    assert_ne!(a, b);
}

#[test]
fn suffix_strips_prefix() {
    let id = ArtifactId::from_string("art-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn id_serde_is_transparent() {
    let id = ArtifactId::from_string("art-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"art-xyz\"");
    let back: ArtifactId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn id_compares_with_str() {
    let id = ArtifactId::from_string("art-xyz");
    assert_eq!(id, "art-xyz");
}
