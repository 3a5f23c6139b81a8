// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::message::OrchestratorMessage;

#[test]
fn encode_prefixes_payload_length() {
    let frame = encode(&OrchestratorMessage::AuthAck).unwrap();
    let size = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    assert_eq!(size as usize, frame.len() - 4);
}

#[test]
fn decode_rejects_garbage() {
    assert!(decode::<OrchestratorMessage>(b"not json").is_err());
}

#[tokio::test]
async fn read_write_round_trip() {
    let msg = OrchestratorMessage::ArtifactAck { artifact_id: "art-abc".into(), offset: 4096 };
    let mut buf = Vec::new();
    write_message(&mut buf, &msg).await.unwrap();

    let mut reader = buf.as_slice();
    let back: OrchestratorMessage = read_message(&mut reader).await.unwrap();
    assert_eq!(back, msg);
}

#[tokio::test]
async fn read_rejects_oversized_prefix() {
    let mut frame = Vec::new();
    frame.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());
    frame.extend_from_slice(b"{}");

    let mut reader = frame.as_slice();
    let err = read_message::<_, OrchestratorMessage>(&mut reader).await.unwrap_err();
    assert!(matches!(err, ProtocolError::TooLarge { .. }));
}

#[tokio::test]
async fn read_surfaces_eof_as_io_error() {
    let mut reader: &[u8] = &[0, 0];
    let err = read_message::<_, OrchestratorMessage>(&mut reader).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Io(_)));
}

#[tokio::test]
async fn back_to_back_frames_are_read_in_order() {
    let first = OrchestratorMessage::AuthAck;
    let second = OrchestratorMessage::ReportAck { job_id: "J1".into() };

    let mut buf = Vec::new();
    write_message(&mut buf, &first).await.unwrap();
    write_message(&mut buf, &second).await.unwrap();

    let mut reader = buf.as_slice();
    let a: OrchestratorMessage = read_message(&mut reader).await.unwrap();
    let b: OrchestratorMessage = read_message(&mut reader).await.unwrap();
    assert_eq!(a, first);
    assert_eq!(b, second);
}
