// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn chunk_spans_covers_exact_multiple() {
    let spans: Vec<_> = chunk_spans(2048, 0, 1024).collect();
    assert_eq!(spans, vec![(0, 1024), (1024, 1024)]);
}

#[test]
fn chunk_spans_trailing_partial_chunk() {
    let spans: Vec<_> = chunk_spans(2500, 0, 1024).collect();
    assert_eq!(spans, vec![(0, 1024), (1024, 1024), (2048, 452)]);
}

#[test]
fn chunk_spans_resumes_mid_stream() {
    let spans: Vec<_> = chunk_spans(3000, 2048, 1024).collect();
    assert_eq!(spans, vec![(2048, 952)]);
}

#[parameterized(
    done = { 1024, 1024 },
    past = { 1024, 4096 },
)]
fn chunk_spans_empty_when_complete(size: u64, from: u64) {
    assert_eq!(chunk_spans(size, from, 512).count(), 0);
}

#[test]
fn chunk_spans_guards_zero_chunk_size() {
    let spans: Vec<_> = chunk_spans(3, 0, 0).collect();
    assert_eq!(spans, vec![(0, 1), (1, 1), (2, 1)]);
}

#[test]
fn default_config_is_sane() {
    let config = TransportConfig::default();
    assert!(config.chunk_size > 0);
    assert!(config.ack_timeout > Duration::ZERO);
}
