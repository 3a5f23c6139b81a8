// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use farm_core::ArtifactKind;

fn large_video_plan() -> FakePlan {
    FakePlan {
        files: vec![(ArtifactKind::Video, "video.mp4".to_string(), vec![0xab; 3000])],
        ..FakePlan::default()
    }
}

#[tokio::test(start_paused = true)]
async fn interrupted_upload_resumes_from_last_acked_offset() {
    let mut h = Harness::new(large_video_plan());
    // Drop the connection after 2 of 3 chunks are acked.
    h.transport.fail_uploads_after(2048, 1);

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Success);

    // The retry resumed at 2048, not at zero.
    let offsets: Vec<u64> = h.transport.chunks().iter().map(|(_, off, _)| *off).collect();
    assert_eq!(offsets, vec![0, 1024, 2048]);

    let video = report.manifest.iter().find(|e| e.kind == ArtifactKind::Video).unwrap();
    assert_eq!(h.transport.bytes_received(&video.artifact_id), 3000);
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn upload_exhaustion_reports_partial_upload() {
    let mut h = Harness::new(large_video_plan());
    // Every attempt dies before any byte is acked.
    h.transport.fail_uploads_after(0, 10);

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Failure);
    assert!(report.diagnostic_summary.contains("upload incomplete at byte"));
    // The manifest still describes what was packaged, so the
    // orchestrator can cross-check the partial bytes it holds.
    assert!(!report.manifest.is_empty());
    h.finish().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_artifacts_upload_cleanly() {
    let mut h = Harness::new(FakePlan {
        files: vec![(ArtifactKind::Log, "target.log".to_string(), Vec::new())],
        ..FakePlan::default()
    });

    h.run_one("J1").await;

    let report = h.sole_report();
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.manifest[0].size_bytes, 0);
    h.finish().await.unwrap();
}
