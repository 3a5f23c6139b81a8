// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport client specs: auth, announcements, report acks, and
//! resumable uploads over real sockets.

use super::prelude::{FakeOrchestrator, GOOD_TOKEN};
use farm_core::{
    AgentIdentity, ArtifactHandle, ArtifactKind, Event, JobAnnouncement, JobStateBuilder, Outcome,
    ResultReport, RetryPolicy, TargetConfig,
};
use farm_transport::{TcpTransport, Transport, TransportConfig};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn test_config(addr: &str) -> TransportConfig {
    TransportConfig {
        addr: addr.to_string(),
        connect_timeout: Duration::from_secs(5),
        ack_timeout: Duration::from_secs(5),
        chunk_size: 1024,
        reconnect: RetryPolicy::new(u32::MAX, Duration::from_millis(20), Duration::from_millis(200)),
    }
}

fn identity(token: &str) -> AgentIdentity {
    AgentIdentity::new(token, vec!["linux".to_string()])
}

async fn connect(
    orchestrator: &FakeOrchestrator,
    token: &str,
) -> (TcpTransport, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(16);
    let (transport, _task) = TcpTransport::spawn(test_config(&orchestrator.addr), identity(token), event_tx);
    (transport, event_rx)
}

/// Skip connectivity noise and return the next substantive event.
async fn next_event(events: &mut mpsc::Receiver<Event>) -> Event {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        match event {
            Event::Connected | Event::ConnectionLost => continue,
            other => return other,
        }
    }
}

fn report(job_id: &str, outcome: Outcome) -> ResultReport {
    let state = JobStateBuilder::default().job_id(job_id).outcome(Some(outcome)).build();
    ResultReport::from_state(&state, Vec::new())
}

fn artifact_on_disk(dir: &TempDir, content: &[u8]) -> ArtifactHandle {
    let path = dir.path().join("video.mp4");
    std::fs::write(&path, content).unwrap();
    ArtifactHandle::builder()
        .kind(ArtifactKind::Video)
        .path(path)
        .size_bytes(content.len() as u64)
        .checksum("spec-checksum")
        .build()
}

#[tokio::test]
async fn agent_authenticates_and_receives_announcements() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (_transport, mut events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    orchestrator.send(farm_wire::OrchestratorMessage::JobAnnouncement {
        announcement: JobAnnouncement {
            job_id: "J1".into(),
            package: "pkg://suite-7".to_string(),
            target: TargetConfig::new("/opt/target/run"),
        },
    });

    match next_event(&mut events).await {
        Event::Announced(announcement) => {
            assert_eq!(announcement.job_id, "J1");
            assert_eq!(announcement.package, "pkg://suite-7");
        }
        other => panic!("expected announcement, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_token_is_surfaced_as_fatal_event() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (_transport, mut events) = connect(&orchestrator, "tok-bad").await;

    match next_event(&mut events).await {
        Event::AuthRejected { reason } => assert_eq!(reason, "unknown token"),
        other => panic!("expected auth rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_frames_become_events() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (_transport, mut events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    orchestrator.send(farm_wire::OrchestratorMessage::CancelJob { job_id: "J1".into() });

    match next_event(&mut events).await {
        Event::CancelJob { job_id } => assert_eq!(job_id, "J1"),
        other => panic!("expected cancel, got {other:?}"),
    }
}

#[tokio::test]
async fn report_send_waits_for_the_ack() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (transport, _events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    transport.send_report(&report("J1", Outcome::Success)).await.unwrap();

    let reports = orchestrator.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].job_id, "J1");
    assert_eq!(reports[0].outcome, Outcome::Success);
}

#[tokio::test]
async fn upload_streams_and_assembles_byte_for_byte() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (transport, _events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
    let artifact = artifact_on_disk(&dir, &content);

    let mut progress = 0;
    transport.upload_artifact(&"J1".into(), &artifact, &mut progress).await.unwrap();

    assert_eq!(progress, 2500);
    assert_eq!(orchestrator.artifact_bytes(&artifact.id), content);
    assert_eq!(orchestrator.acked_offsets(), vec![0, 1024, 2048]);
}

#[tokio::test]
async fn upload_resumes_from_last_acked_offset_after_reconnect() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (transport, _events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..3000u32).map(|i| (i % 199) as u8).collect();
    let artifact = artifact_on_disk(&dir, &content);

    // 2 of 3 chunks acked, then the connection drops.
    orchestrator.drop_connection_after_chunks(2);

    let mut progress = 0;
    let err = transport.upload_artifact(&"J1".into(), &artifact, &mut progress).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(progress, 2048);

    // The actor reconnects and re-authenticates on its own.
    orchestrator.wait_auths(2).await;

    // A retried call resumes from byte 2048, not from zero.
    transport.upload_artifact(&"J1".into(), &artifact, &mut progress).await.unwrap();
    assert_eq!(progress, 3000);
    assert_eq!(orchestrator.acked_offsets(), vec![0, 1024, 2048]);
    assert_eq!(orchestrator.artifact_bytes(&artifact.id), content);
}

#[tokio::test]
async fn duplicate_report_sends_carry_identical_content() {
    let orchestrator = FakeOrchestrator::spawn().await;
    let (transport, _events) = connect(&orchestrator, GOOD_TOKEN).await;
    orchestrator.wait_auths(1).await;

    let once = report("J1", Outcome::Failure);
    transport.send_report(&once).await.unwrap();
    transport.send_report(&once).await.unwrap();

    let reports = orchestrator.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0], reports[1]);
}
