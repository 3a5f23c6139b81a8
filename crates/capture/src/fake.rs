// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable supervisor for controller tests.

use crate::error::CaptureError;
use crate::supervisor::{CaptureReport, CapturedFile, RunRequest, RunVerdict, Supervisor};
use async_trait::async_trait;
use farm_core::ArtifactKind;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Script for one fake run.
#[derive(Debug, Clone)]
pub struct FakePlan {
    /// Fail launch instead of running.
    pub launch_error: bool,
    /// Verdict when the run completes uncancelled.
    pub verdict: RunVerdict,
    /// Simulated run time (virtual under paused test time).
    pub run_time: Duration,
    /// Files written into the request's output dir: (kind, name, content).
    pub files: Vec<(ArtifactKind, String, Vec<u8>)>,
}

impl Default for FakePlan {
    fn default() -> Self {
        Self {
            launch_error: false,
            verdict: RunVerdict::Completed { exit_code: 0 },
            run_time: Duration::from_millis(50),
            files: vec![
                (ArtifactKind::Video, "video.mp4".to_string(), b"mp4-bytes".to_vec()),
                (ArtifactKind::Log, "target.log".to_string(), b"target output\n".to_vec()),
            ],
        }
    }
}

#[derive(Default)]
struct FakeCalls {
    runs: u32,
    cancelled_runs: u32,
}

/// In-memory [`Supervisor`] driven by a [`FakePlan`].
#[derive(Clone, Default)]
pub struct FakeSupervisor {
    plan: Arc<Mutex<FakePlan>>,
    calls: Arc<Mutex<FakeCalls>>,
}

impl FakeSupervisor {
    pub fn new(plan: FakePlan) -> Self {
        Self { plan: Arc::new(Mutex::new(plan)), calls: Arc::default() }
    }

    pub fn set_plan(&self, plan: FakePlan) {
        *self.plan.lock() = plan;
    }

    /// Completed runs (including cancelled ones).
    pub fn runs(&self) -> u32 {
        self.calls.lock().runs
    }

    /// Runs that observed cancellation mid-flight.
    pub fn cancelled_runs(&self) -> u32 {
        self.calls.lock().cancelled_runs
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn run(
        &self,
        req: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<CaptureReport, CaptureError> {
        let plan = self.plan.lock().clone();
        self.calls.lock().runs += 1;

        if plan.launch_error {
            return Err(CaptureError::Launch {
                what: "target".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            });
        }

        let verdict = tokio::select! {
            _ = tokio::time::sleep(plan.run_time) => plan.verdict.clone(),
            _ = cancel.cancelled() => {
                self.calls.lock().cancelled_runs += 1;
                RunVerdict::Cancelled
            }
        };

        std::fs::create_dir_all(&req.output_dir).map_err(|source| CaptureError::Workspace {
            path: req.output_dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for (kind, name, content) in &plan.files {
            let path = req.output_dir.join(name);
            std::fs::write(&path, content)
                .map_err(|source| CaptureError::Workspace { path: path.clone(), source })?;
            files.push(CapturedFile { kind: *kind, path });
        }

        Ok(CaptureReport { verdict, files, duration: plan.run_time })
    }
}
