// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use farm_capture::RunVerdict;
use farm_core::ArtifactKind;

#[tokio::test(start_paused = true)]
async fn fetch_retries_transient_errors_then_succeeds() {
    let mut h = Harness::new(FakePlan::default());
    h.fetcher.fail_times(2);

    h.run_one("J1").await;

    assert_eq!(h.fetcher.calls(), 3);
    assert_eq!(h.sole_report().outcome, Outcome::Success);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fetch_not_found_fails_without_execution() {
    let mut h = Harness::new(FakePlan::default());
    h.fetcher.always_not_found();

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert!(report.diagnostic_summary.contains("not found"));
    assert!(report.manifest.is_empty());
    // Permanent error: one attempt, no execution.
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.supervisor.runs(), 0);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fetch_exhaustion_fails_the_job() {
    let mut h = Harness::new(FakePlan::default());
    h.fetcher.fail_times(10);

    h.run_one("J1").await;

    assert_eq!(h.fetcher.calls(), 3); // bounded by the fetch policy
    assert_eq!(h.sole_report().outcome, Outcome::Failure);
    assert_eq!(h.supervisor.runs(), 0);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn launch_error_fails_immediately_without_retry() {
    let mut h = Harness::new(FakePlan { launch_error: true, ..FakePlan::default() });

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert!(report.diagnostic_summary.contains("launch"));
    // Environment defect: not retried within the job.
    assert_eq!(h.supervisor.runs(), 1);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn crash_reports_failure_but_keeps_the_recording() {
    let mut h = Harness::new(FakePlan {
        verdict: RunVerdict::Crashed { exit_code: None },
        ..FakePlan::default()
    });

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert!(report.diagnostic_summary.contains("crashed"));
    // Bytes were captured, so the manifest is never empty.
    assert!(report.manifest.iter().any(|e| e.kind == ArtifactKind::Video));
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failure_exit_code_reports_failure() {
    let mut h = Harness::new(FakePlan {
        verdict: RunVerdict::Completed { exit_code: 7 },
        ..FakePlan::default()
    });

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert!(report.diagnostic_summary.contains("code 7"));
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_outcome_survives_report_retries() {
    let mut h = Harness::new(FakePlan { verdict: RunVerdict::TimedOut, ..FakePlan::default() });
    h.transport.fail_reports(2);

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Timeout);
    assert!(report.diagnostic_summary.contains("budget"));
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn report_is_abandoned_after_bounded_retries() {
    let mut h = Harness::new(FakePlan::default());
    h.transport.fail_reports(10);

    h.run_one("J1").await;
    assert!(h.transport.reports().is_empty());

    // The controller survived the abandoned job and takes the next one.
    h.run_one("J2").await;
    let ids: Vec<_> = h.transport.reports().iter().map(|r| r.job_id.to_string()).collect();
    assert_eq!(ids, vec!["J2"]);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lost_ack_resends_identical_report() {
    let mut h = Harness::new(FakePlan::default());
    h.transport.lose_report_acks(1);

    h.run_one("J1").await;

    // The orchestrator saw the send twice; both carry identical content
    // (same manifest, same outcome) so jobId matching deduplicates.
    let reports = h.transport.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0], reports[1]);
    assert_eq!(h.supervisor.runs(), 1);
    h.finish().await.unwrap();
}
