// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process teardown helpers.
//!
//! Teardown is best-effort by contract: failures are logged and the
//! child is force-killed, but nothing here escalates an error.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// Send `sig` to the child, wait up to `grace` for it to exit, then
/// SIGKILL. Returns the exit status when one could be collected.
pub(crate) async fn stop_child(
    child: &mut Child,
    what: &str,
    sig: Signal,
    grace: Duration,
) -> Option<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return child.try_wait().ok().flatten();
    };

    if let Err(err) = kill(Pid::from_raw(pid as i32), sig) {
        tracing::debug!(what, %err, "signal delivery failed; killing");
        return force_kill(child, what).await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(err)) => {
            tracing::warn!(what, %err, "wait after signal failed");
            None
        }
        Err(_) => {
            tracing::warn!(what, grace_ms = grace.as_millis() as u64, "did not exit in grace; killing");
            force_kill(child, what).await
        }
    }
}

async fn force_kill(child: &mut Child, what: &str) -> Option<ExitStatus> {
    if let Err(err) = child.start_kill() {
        tracing::debug!(what, %err, "kill failed (already gone?)");
    }
    match child.wait().await {
        Ok(status) => Some(status),
        Err(err) => {
            tracing::warn!(what, %err, "wait after kill failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;
