// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recorder subprocess: screen+audio capture of the target's surface.

use crate::error::CaptureError;
use crate::proc;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Recorder invocation template.
///
/// `{output}` in any argument is replaced with the capture output path.
/// The default records the X11 display plus the default pulse source,
/// which matches the surface the target is launched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl RecorderConfig {
    /// ffmpeg capturing X11 video and pulse audio.
    ///
    /// `-y` because a retried job reuses its output path; SIGINT makes
    /// ffmpeg finalize the container so a forced stop still yields a
    /// playable (if truncated) file.
    pub fn x11grab(display: &str) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args: vec![
                "-y".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-f".to_string(),
                "x11grab".to_string(),
                "-i".to_string(),
                display.to_string(),
                "-f".to_string(),
                "pulse".to_string(),
                "-i".to_string(),
                "default".to_string(),
                "{output}".to_string(),
            ],
        }
    }

    pub(crate) fn render_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args.iter().map(|a| a.replace("{output}", &output)).collect()
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::x11grab(":0.0")
    }
}

#[derive(Debug)]
pub(crate) struct RecorderHandle {
    child: Child,
}

/// Launch the recorder against `output`.
pub(crate) fn start_recorder(
    config: &RecorderConfig,
    output: &Path,
) -> Result<RecorderHandle, CaptureError> {
    let child = Command::new(&config.program)
        .args(config.render_args(output))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CaptureError::Launch { what: "recorder".to_string(), source })?;

    tracing::info!(program = %config.program, output = %output.display(), "recorder started");
    Ok(RecorderHandle { child })
}

/// Stop the recorder, giving it `flush_grace` to finalize the encoding.
///
/// SIGINT first — the clean-stop path for capture tools — then SIGKILL.
/// A recorder that already died is fine; the partial file is kept either
/// way.
pub(crate) async fn stop_recorder(mut handle: RecorderHandle, flush_grace: Duration) {
    match proc::stop_child(&mut handle.child, "recorder", Signal::SIGINT, flush_grace).await {
        Some(status) if status.success() => {
            tracing::debug!("recorder finalized cleanly");
        }
        Some(status) => {
            tracing::warn!(?status, "recorder exited uncleanly; keeping partial capture");
        }
        None => {
            tracing::warn!("recorder teardown did not yield an exit status");
        }
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
