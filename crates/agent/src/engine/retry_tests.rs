// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(100), Duration::from_secs(5))
}

#[derive(Debug)]
struct Flaky(&'static str);

impl std::fmt::Display for Flaky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

fn transient(_: &Flaky) -> bool {
    true
}

fn permanent(_: &Flaky) -> bool {
    false
}

#[tokio::test(start_paused = true)]
async fn retries_transient_errors_until_success() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let result = with_retry(&policy(5), "op", transient, move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(Flaky("nope"))
        } else {
            Ok(42)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_surfaces_the_last_error() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let result: Result<(), Flaky> = with_retry(&policy(3), "op", transient, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Flaky("still down"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let result: Result<(), Flaky> = with_retry(&policy(5), "op", permanent, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Flaky("bad request"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_policy_never_sleeps() {
    let started = tokio::time::Instant::now();
    let result: Result<(), Flaky> =
        with_retry(&policy(1), "op", transient, move || async move { Err(Flaky("down")) }).await;

    assert!(result.is_err());
    assert_eq!(started.elapsed(), Duration::ZERO);
}
