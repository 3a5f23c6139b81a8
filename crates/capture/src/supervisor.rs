// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One bounded target+recorder run.

use crate::error::CaptureError;
use crate::proc;
use crate::recorder::{self, RecorderConfig};
use async_trait::async_trait;
use farm_core::{ArtifactKind, JobId, TargetConfig};
use nix::sys::signal::Signal;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Everything one run needs. The package directory is the target's
/// working directory; all capture output lands under `output_dir`.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub job_id: JobId,
    pub target: TargetConfig,
    pub package_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Hard wall-clock budget for the whole run.
    pub budget: Duration,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    /// Target ran to completion and exited with a code. Non-zero means
    /// the test workload reported failure, not a crash.
    Completed { exit_code: i32 },
    /// Target died abnormally (signal, or exit before its surface came
    /// up). Evidence is preserved and tagged.
    Crashed { exit_code: Option<i32> },
    /// Wall-clock budget exhausted; both processes force-stopped.
    TimedOut,
    /// Cancelled mid-run; normal teardown was performed.
    Cancelled,
}

/// A file produced during the run, not yet checksummed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFile {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Result of a run. Only launch failures error out; crashes, timeouts
/// and cancellation all come back as verdicts with their evidence.
#[derive(Debug)]
pub struct CaptureReport {
    pub verdict: RunVerdict,
    pub files: Vec<CapturedFile>,
    pub duration: Duration,
}

/// Drives the target and recorder for one job at a time.
#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn run(
        &self,
        req: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CaptureReport, CaptureError>;
}

/// Real child-process supervisor.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    pub recorder: RecorderConfig,
    /// Wait after target launch before recording starts (surface
    /// readiness grace).
    pub ready_grace: Duration,
    /// Grace window for each teardown signal before SIGKILL.
    pub stop_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(recorder: RecorderConfig) -> Self {
        Self {
            recorder,
            ready_grace: Duration::from_secs(5),
            stop_grace: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    async fn run(
        &self,
        req: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CaptureReport, CaptureError> {
        let started = Instant::now();
        let paths = RunPaths::prepare(&req.output_dir)?;

        let mut target = start_target(&req.target, &req.package_dir, &paths)?;
        tracing::info!(job = %req.job_id, program = %req.target.program, "target started");

        // Surface readiness: fixed grace period, cut short if the target
        // dies or the job is cancelled first.
        let deadline = started + req.budget;
        tokio::select! {
            status = target.wait() => {
                // Exited before its surface ever came up — no recording
                // to make, but the log is still evidence.
                tracing::warn!(job = %req.job_id, ?status, "target exited during readiness grace");
                return Ok(CaptureReport {
                    verdict: RunVerdict::Crashed { exit_code: status.ok().and_then(|s| s.code()) },
                    files: paths.collect(None),
                    duration: started.elapsed(),
                });
            }
            _ = cancel.cancelled() => {
                stop_target(&mut target, self.stop_grace).await;
                return Ok(CaptureReport {
                    verdict: RunVerdict::Cancelled,
                    files: paths.collect(None),
                    duration: started.elapsed(),
                });
            }
            _ = tokio::time::sleep(self.ready_grace.min(req.budget)) => {}
        }

        let recorder_handle = match recorder::start_recorder(&self.recorder, &paths.video) {
            Ok(handle) => handle,
            Err(err) => {
                // Recorder launch is an environment defect; tear the
                // target down before surfacing it.
                stop_target(&mut target, self.stop_grace).await;
                return Err(err);
            }
        };

        // Main wait: target exit, cancellation, or the shared deadline.
        let verdict = tokio::select! {
            status = target.wait() => verdict_for(status),
            _ = cancel.cancelled() => RunVerdict::Cancelled,
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => RunVerdict::TimedOut,
        };

        // Teardown in reverse start order: recorder first so the capture
        // is flushed and finalized while the surface still exists.
        recorder::stop_recorder(recorder_handle, self.stop_grace).await;
        if !matches!(verdict, RunVerdict::Completed { .. } | RunVerdict::Crashed { .. }) {
            stop_target(&mut target, self.stop_grace).await;
        }

        tracing::info!(job = %req.job_id, ?verdict, elapsed_ms = started.elapsed().as_millis() as u64, "run finished");
        Ok(CaptureReport {
            verdict,
            files: paths.collect(Some(&paths.video)),
            duration: started.elapsed(),
        })
    }
}

/// Classify a collected target exit.
fn verdict_for(status: std::io::Result<ExitStatus>) -> RunVerdict {
    match status {
        Ok(status) => match status.code() {
            Some(code) => RunVerdict::Completed { exit_code: code },
            // Killed by a signal — segfault, abort, OOM kill.
            None => RunVerdict::Crashed { exit_code: None },
        },
        Err(err) => {
            tracing::warn!(%err, "target wait failed");
            RunVerdict::Crashed { exit_code: None }
        }
    }
}

/// Launch the target with its output captured to the run's log file.
fn start_target(
    target: &TargetConfig,
    package_dir: &Path,
    paths: &RunPaths,
) -> Result<Child, CaptureError> {
    let log = std::fs::File::create(&paths.log)
        .map_err(|source| CaptureError::Workspace { path: paths.log.clone(), source })?;
    let log_err = log
        .try_clone()
        .map_err(|source| CaptureError::Workspace { path: paths.log.clone(), source })?;

    let mut cmd = Command::new(&target.program);
    cmd.args(&target.args)
        .envs(&target.env)
        .env("FARM_RESULTS_DIR", &paths.results)
        .current_dir(package_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::from(log))
        .stderr(std::process::Stdio::from(log_err))
        .kill_on_drop(true);
    if let Some(ref entry) = target.entry_point {
        cmd.env("FARM_ENTRY_POINT", entry);
    }

    cmd.spawn()
        .map_err(|source| CaptureError::Launch { what: "target".to_string(), source })
}

async fn stop_target(child: &mut Child, grace: Duration) {
    if proc::stop_child(child, "target", Signal::SIGTERM, grace).await.is_none() {
        tracing::warn!("target teardown did not yield an exit status");
    }
}

/// Output locations for one run.
struct RunPaths {
    video: PathBuf,
    log: PathBuf,
    results: PathBuf,
}

impl RunPaths {
    fn prepare(output_dir: &Path) -> Result<Self, CaptureError> {
        let results = output_dir.join("results");
        std::fs::create_dir_all(&results)
            .map_err(|source| CaptureError::Workspace { path: results.clone(), source })?;
        Ok(Self {
            video: output_dir.join("video.mp4"),
            log: output_dir.join("target.log"),
            results,
        })
    }

    /// Gather whatever the run left behind: the log, the recording when
    /// one was produced (partial files count — they are evidence), and
    /// every file the target wrote under `results/`.
    fn collect(&self, video: Option<&Path>) -> Vec<CapturedFile> {
        let mut files = Vec::new();
        if let Some(video) = video {
            if video.exists() {
                files.push(CapturedFile { kind: ArtifactKind::Video, path: video.to_path_buf() });
            }
        }
        if self.log.exists() {
            files.push(CapturedFile { kind: ArtifactKind::Log, path: self.log.clone() });
        }
        collect_results(&self.results, &mut files);
        files
    }
}

/// Recursively collect result-data files.
fn collect_results(dir: &Path, files: &mut Vec<CapturedFile>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), %err, "results directory unreadable");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_results(&path, files);
        } else {
            files.push(CapturedFile { kind: ArtifactKind::ResultData, path });
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
