// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::artifact::{ArtifactHandle, ArtifactKind, ManifestEntry};
use crate::clock::FakeClock;
use crate::report::ResultReport;
use yare::parameterized;

fn announcement() -> JobAnnouncement {
    JobAnnouncement {
        job_id: JobId::new("J1"),
        package: "pkg://suite-7".to_string(),
        target: TargetConfig::new("/opt/target/run"),
    }
}

#[test]
fn new_state_starts_fetching() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(5_000);
    let state = JobState::new(&announcement(), &clock);
    assert_eq!(state.job_id, "J1");
    assert_eq!(state.phase, JobPhase::Fetching);
    assert_eq!(state.started_at_ms, 5_000);
    assert!(state.artifacts.is_empty());
    assert!(state.error_log.is_empty());
    assert!(!state.cancel_requested);
}

#[test]
fn record_artifact_rejects_duplicate_ids() {
    let mut state = JobState::builder().build();
    let handle = ArtifactHandle::builder().kind(ArtifactKind::Video).build();
    let dup = handle.clone();

    assert!(state.record_artifact(handle).is_ok());
    let rejected = state.record_artifact(dup);
    assert_eq!(rejected, Err(state.artifacts[0].id.clone()));
    assert_eq!(state.artifacts.len(), 1);
}

#[test]
fn record_artifact_keeps_capture_order() {
    let mut state = JobState::builder().build();
    let video = ArtifactHandle::builder().kind(ArtifactKind::Video).build();
    let log = ArtifactHandle::builder().kind(ArtifactKind::Log).build();
    state.record_artifact(video).unwrap();
    state.record_artifact(log).unwrap();

    let kinds: Vec<_> = state.artifacts.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ArtifactKind::Video, ArtifactKind::Log]);
}

#[test]
fn error_log_preserves_order() {
    let mut state = JobState::builder().build();
    state.record_error(1, "target crashed");
    state.record_error(2, "recorder flush truncated");
    assert_eq!(state.diagnostic_summary(), "target crashed; recorder flush truncated");
}

#[test]
fn effective_outcome_defaults_to_failure() {
    let state = JobState::builder().build();
    assert_eq!(state.effective_outcome(), Outcome::Failure);

    let state = JobState::builder().outcome(Some(Outcome::Timeout)).build();
    assert_eq!(state.effective_outcome(), Outcome::Timeout);
}

#[parameterized(
    idle = { JobPhase::Idle, "idle" },
    fetching = { JobPhase::Fetching, "fetching" },
    executing = { JobPhase::Executing, "executing" },
    packaging = { JobPhase::Packaging, "packaging" },
    uploading = { JobPhase::Uploading, "uploading" },
    reporting = { JobPhase::Reporting, "reporting" },
    failed = { JobPhase::Failed, "failed" },
    aborted = { JobPhase::Aborted, "aborted" },
)]
fn phase_display(phase: JobPhase, expected: &str) {
    assert_eq!(phase.to_string(), expected);
}

#[parameterized(
    success = { Outcome::Success, "success" },
    failure = { Outcome::Failure, "failure" },
    timeout = { Outcome::Timeout, "timeout" },
    aborted = { Outcome::Aborted, "aborted" },
)]
fn outcome_serde_uses_snake_case(outcome: Outcome, expected: &str) {
    let json = serde_json::to_string(&outcome).unwrap();
    assert_eq!(json, format!("\"{expected}\""));
}

#[test]
fn report_from_state_carries_diagnostics() {
    let mut state = JobState::builder().outcome(Some(Outcome::Failure)).build();
    state.record_error(1, "target exited before recorder stop");
    let handle = ArtifactHandle::builder().kind(ArtifactKind::Video).build();
    state.record_artifact(handle).unwrap();

    let manifest = state.artifacts.iter().map(ManifestEntry::from).collect();
    let report = ResultReport::from_state(&state, manifest);

    assert_eq!(report.job_id, state.job_id);
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.manifest.len(), 1);
    assert_eq!(report.manifest[0].kind, ArtifactKind::Video);
    assert!(report.diagnostic_summary.contains("before recorder stop"));
}

#[test]
fn report_content_is_stable_across_clones() {
    // Retried sends must carry identical content.
    let state = JobState::builder().outcome(Some(Outcome::Success)).build();
    let report = ResultReport::from_state(&state, Vec::new());
    let resend = report.clone();
    assert_eq!(report, resend);
}

#[test]
fn status_snapshot_tracks_active_job() {
    let idle = AgentStatus::idle();
    assert_eq!(idle.phase, JobPhase::Idle);
    assert!(idle.job_id.is_none());

    let active = AgentStatus::active(&JobId::new("J1"), JobPhase::Executing);
    assert_eq!(active.job_id, Some(JobId::new("J1")));
    assert_eq!(active.phase, JobPhase::Executing);
}
