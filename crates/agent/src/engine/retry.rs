// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one bounded-retry loop every retrying call site goes through.

use farm_core::RetryPolicy;
use std::future::Future;

/// Run `op` under `policy`, sleeping a jittered backoff between
/// attempts. Only errors `is_transient` approves are retried; permanent
/// errors and budget exhaustion surface the last error.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &'static str,
    is_transient: fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && !policy.is_exhausted(attempt) => {
                let delay = policy.jittered(attempt);
                tracing::warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %err,
                    "transient failure; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::warn!(what, attempt, %err, "giving up");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
