// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, announcement, and per-job state.

use crate::artifact::{ArtifactHandle, ArtifactId};
use crate::clock::Clock;
use crate::target::TargetConfig;
use serde::{Deserialize, Serialize};

/// Opaque job identifier assigned by the orchestrator.
///
/// Retained across reconnects so the orchestrator can match duplicate
/// reports for the same job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub smol_str::SmolStr);

impl JobId {
    pub fn new(id: impl Into<smol_str::SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(smol_str::SmolStr::new(s))
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(smol_str::SmolStr::new(&s))
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One unit of work published by the orchestrator.
///
/// Immutable for the duration of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAnnouncement {
    pub job_id: JobId,
    /// Location of the test package to fetch (URL or repository path).
    pub package: String,
    pub target: TargetConfig,
}

/// Phase of the job lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// No active job; waiting for an announcement
    Idle,
    /// Retrieving the test package
    Fetching,
    /// Target and recorder running under the Capture Supervisor
    Executing,
    /// Building the checksummed bundle
    Packaging,
    /// Streaming artifacts to the orchestrator
    Uploading,
    /// Sending the result report
    Reporting,
    /// Job failed; best-effort report in progress
    Failed,
    /// Job cancelled; teardown and best-effort report in progress
    Aborted,
}

crate::simple_display! {
    JobPhase {
        Idle => "idle",
        Fetching => "fetching",
        Executing => "executing",
        Packaging => "packaging",
        Uploading => "uploading",
        Reporting => "reporting",
        Failed => "failed",
        Aborted => "aborted",
    }
}

/// Final classification of a job, carried in the result report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    Aborted,
}

crate::simple_display! {
    Outcome {
        Success => "success",
        Failure => "failure",
        Timeout => "timeout",
        Aborted => "aborted",
    }
}

/// One recorded failure, ordered by occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub at_ms: u64,
    pub message: String,
}

/// Mutable record of the active job, owned exclusively by the Job
/// Controller. Exactly one instance exists at a time; a second
/// announcement while one is live is rejected, never queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: JobId,
    /// Package reference from the announcement (kept for diagnostics).
    pub package: String,
    pub phase: JobPhase,
    pub started_at_ms: u64,
    /// Every artifact produced so far, in capture order.
    pub artifacts: Vec<ArtifactHandle>,
    /// Ordered failure log; becomes the report's diagnostic summary.
    pub error_log: Vec<ErrorEntry>,
    pub cancel_requested: bool,
    /// Set once execution settles; `None` until then.
    pub outcome: Option<Outcome>,
}

impl JobState {
    pub fn new(announcement: &JobAnnouncement, clock: &impl Clock) -> Self {
        Self {
            job_id: announcement.job_id.clone(),
            package: announcement.package.clone(),
            phase: JobPhase::Fetching,
            started_at_ms: clock.epoch_ms(),
            artifacts: Vec::new(),
            error_log: Vec::new(),
            cancel_requested: false,
            outcome: None,
        }
    }

    /// Record an artifact handle. Rejects duplicates so nothing is ever
    /// packaged twice; the caller logs the discarded handle.
    pub fn record_artifact(&mut self, handle: ArtifactHandle) -> Result<(), ArtifactId> {
        if self.artifacts.iter().any(|a| a.id == handle.id) {
            return Err(handle.id);
        }
        self.artifacts.push(handle);
        Ok(())
    }

    /// Append an entry to the ordered failure log.
    pub fn record_error(&mut self, at_ms: u64, message: impl Into<String>) {
        self.error_log.push(ErrorEntry { at_ms, message: message.into() });
    }

    /// The outcome to report: the recorded one, or `Failure` if the job
    /// never got far enough to settle one.
    pub fn effective_outcome(&self) -> Outcome {
        self.outcome.unwrap_or(Outcome::Failure)
    }

    /// Render the error log as a single diagnostic summary string.
    pub fn diagnostic_summary(&self) -> String {
        self.error_log
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Snapshot of the controller for external health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub job_id: Option<JobId>,
    pub phase: JobPhase,
}

impl AgentStatus {
    pub fn idle() -> Self {
        Self { job_id: None, phase: JobPhase::Idle }
    }

    pub fn active(job_id: &JobId, phase: JobPhase) -> Self {
        Self { job_id: Some(job_id.clone()), phase }
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::idle()
    }
}

crate::builder! {
    pub struct JobStateBuilder => JobState {
        into {
            job_id: JobId = "job-test-1",
            package: String = "pkg://suite-test",
        }
        set {
            phase: JobPhase = JobPhase::Fetching,
            started_at_ms: u64 = 1_000_000,
            artifacts: Vec<ArtifactHandle> = Vec::new(),
            error_log: Vec<ErrorEntry> = Vec::new(),
            cancel_requested: bool = false,
            outcome: Option<Outcome> = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
