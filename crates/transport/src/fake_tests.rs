// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use farm_core::{ArtifactKind, JobState, Outcome};

fn artifact(size: u64) -> ArtifactHandle {
    ArtifactHandle::builder()
        .kind(ArtifactKind::Video)
        .path("/work/j1/video.mp4")
        .size_bytes(size)
        .checksum("feed")
        .build()
}

#[tokio::test]
async fn upload_acks_whole_artifact() {
    let fake = FakeTransport::new().with_chunk_size(1024);
    let handle = artifact(2500);
    let mut progress = 0;

    fake.upload_artifact(&"J1".into(), &handle, &mut progress).await.unwrap();

    assert_eq!(progress, 2500);
    assert_eq!(fake.bytes_received(&handle.id), 2500);
}

#[tokio::test]
async fn scripted_failure_stops_mid_upload_and_resumes() {
    let fake = FakeTransport::new().with_chunk_size(1024);
    fake.fail_uploads_after(2048, 1);
    let handle = artifact(3000);
    let mut progress = 0;

    let err = fake.upload_artifact(&"J1".into(), &handle, &mut progress).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(progress, 2048);

    // Retry resumes from the last acked offset, not from zero.
    fake.upload_artifact(&"J1".into(), &handle, &mut progress).await.unwrap();
    assert_eq!(progress, 3000);
    let offsets: Vec<u64> = fake.chunks().iter().map(|(_, off, _)| *off).collect();
    assert_eq!(offsets, vec![0, 1024, 2048]);
}

#[tokio::test]
async fn scripted_report_failures_then_success() {
    let fake = FakeTransport::new();
    fake.fail_reports(2);
    let state = JobState::builder().outcome(Some(Outcome::Success)).build();
    let report = ResultReport::from_state(&state, Vec::new());

    assert!(fake.send_report(&report).await.is_err());
    assert!(fake.send_report(&report).await.is_err());
    fake.send_report(&report).await.unwrap();
    assert_eq!(fake.reports().len(), 1);
}
