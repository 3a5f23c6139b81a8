// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test(start_paused = true)]
async fn cancel_mid_executing_aborts_with_partial_evidence() {
    let mut h = Harness::new(FakePlan { run_time: ms(60_000), ..FakePlan::default() });

    h.announce("J1").await;
    h.wait_phase(JobPhase::Executing).await;
    h.events.send(Event::CancelJob { job_id: "J1".into() }).await.unwrap();
    h.wait_phase(JobPhase::Idle).await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Aborted);
    assert!(report.diagnostic_summary.contains("cancelled"));
    // Teardown ran: the supervisor observed the cancel and partial
    // evidence was still packaged and reported.
    assert_eq!(h.supervisor.cancelled_runs(), 1);
    assert!(!report.manifest.is_empty());

    // Ready for the next announcement.
    h.run_one("J2").await;
    assert_eq!(h.transport.reports().len(), 2);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_for_a_different_job_is_ignored() {
    let mut h = Harness::new(FakePlan { run_time: ms(1_000), ..FakePlan::default() });

    h.announce("J1").await;
    h.wait_phase(JobPhase::Executing).await;
    h.events.send(Event::CancelJob { job_id: "J-other".into() }).await.unwrap();
    h.wait_phase(JobPhase::Idle).await;

    assert_eq!(h.sole_report().outcome, Outcome::Success);
    assert_eq!(h.supervisor.cancelled_runs(), 0);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn process_shutdown_winds_the_active_job_down() {
    let mut h = Harness::new(FakePlan { run_time: ms(60_000), ..FakePlan::default() });

    h.announce("J1").await;
    h.wait_phase(JobPhase::Executing).await;
    h.shutdown.cancel();
    h.wait_phase(JobPhase::Idle).await;

    // The job went through the abort path, reported, and the controller
    // then honored the shutdown.
    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Aborted);
    h.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_before_fetch_completes_reports_aborted_without_artifacts() {
    let mut h = Harness::new(FakePlan::default());
    // Fetch keeps failing transiently, so the job lingers in Fetching.
    h.fetcher.fail_times(2);

    h.announce("J1").await;
    h.wait_phase(JobPhase::Fetching).await;
    h.events.send(Event::CancelJob { job_id: "J1".into() }).await.unwrap();
    h.wait_phase(JobPhase::Idle).await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Aborted);
    assert!(report.manifest.is_empty());
    assert_eq!(h.supervisor.runs(), 0);
    h.finish().await.unwrap();
}
