// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use farm_core::ArtifactKind;

#[tokio::test(start_paused = true)]
async fn happy_path_reports_success_with_video_manifest() {
    let mut h = Harness::new(FakePlan::default());
    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.job_id, "J1");
    assert_eq!(report.outcome, Outcome::Success);
    assert!(report.diagnostic_summary.is_empty());

    let kinds: Vec<_> = report.manifest.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&ArtifactKind::Video));
    assert!(kinds.contains(&ArtifactKind::Log));

    // Checksums are final-content SHA-256, verifiable independent of
    // the transport.
    let video = report.manifest.iter().find(|e| e.kind == ArtifactKind::Video).unwrap();
    assert_eq!(video.file_name, "video.mp4");
    assert_eq!(video.size_bytes, "mp4-bytes".len() as u64);
    assert_eq!(video.checksum.len(), 64);

    // Every manifest byte was uploaded and acked.
    assert_eq!(h.transport.bytes_received(&video.artifact_id), video.size_bytes);

    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn announcement_mid_job_is_rejected_not_queued() {
    let mut h = Harness::new(FakePlan { run_time: ms(5_000), ..FakePlan::default() });

    h.announce("J1").await;
    h.wait_phase(JobPhase::Executing).await;
    // Arrives while J1 is active: must be rejected, never queued.
    h.announce("J-overassigned").await;
    h.wait_phase(JobPhase::Idle).await;

    h.run_one("J2").await;

    let ids: Vec<_> = h.transport.reports().iter().map(|r| r.job_id.to_string()).collect();
    assert_eq!(ids, vec!["J1", "J2"]);
    assert_eq!(h.supervisor.runs(), 2);

    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn status_accessor_tracks_phase_and_job() {
    let mut h = Harness::new(FakePlan { run_time: ms(5_000), ..FakePlan::default() });

    assert_eq!(*h.status.borrow(), AgentStatus::idle());

    h.announce("J1").await;
    h.wait_phase(JobPhase::Executing).await;
    {
        let status = h.status.borrow();
        assert_eq!(status.job_id.as_ref().map(|id| id.to_string()), Some("J1".to_string()));
        assert_eq!(status.phase, JobPhase::Executing);
    }

    h.wait_phase(JobPhase::Idle).await;
    assert!(h.status.borrow().job_id.is_none());

    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_is_fatal() {
    let h = Harness::new(FakePlan::default());
    h.events
        .send(Event::AuthRejected { reason: "token revoked".to_string() })
        .await
        .unwrap();

    let err = h.task.await.unwrap().unwrap_err();
    assert!(matches!(err, ControllerError::AuthRejected(reason) if reason == "token revoked"));
}

#[tokio::test(start_paused = true)]
async fn connection_blips_while_idle_are_absorbed() {
    let mut h = Harness::new(FakePlan::default());
    h.events.send(Event::ConnectionLost).await.unwrap();
    h.events.send(Event::Connected).await.unwrap();

    h.run_one("J1").await;
    assert_eq!(h.sole_report().outcome, Outcome::Success);

    h.finish().await.unwrap();
}
