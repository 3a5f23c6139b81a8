// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection actor: owns the socket, authenticates, reconnects.
//!
//! The actor is the only code that touches the stream. Incoming frames
//! are parsed by a dedicated reader task and routed here, so a dropped
//! connection can never tear half a frame out from under a write.

use crate::client::{Cmd, TransportConfig};
use crate::error::TransportError;
use farm_core::{AgentIdentity, ArtifactId, Event, JobId};
use farm_wire::{read_message, write_message, AgentMessage, OrchestratorMessage};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

/// Why a served connection ended.
enum ServeEnd {
    /// Client handle dropped; the actor exits.
    CommandsClosed,
    /// Socket failed; the actor reconnects.
    ConnectionLost,
}

/// Actor entry point. Runs until the command channel closes or the
/// orchestrator rejects authentication.
pub(crate) async fn run(
    config: TransportConfig,
    identity: AgentIdentity,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Cmd>,
) {
    let mut attempt: u32 = 0;
    loop {
        match establish(&config, &identity).await {
            Ok(stream) => {
                attempt = 0;
                tracing::info!(addr = %config.addr, "connected to orchestrator");
                let _ = event_tx.send(Event::Connected).await;
                match serve(stream, &mut cmd_rx, &event_tx).await {
                    ServeEnd::CommandsClosed => return,
                    ServeEnd::ConnectionLost => {
                        tracing::warn!(addr = %config.addr, "orchestrator connection lost");
                        let _ = event_tx.send(Event::ConnectionLost).await;
                    }
                }
            }
            Err(TransportError::Auth(reason)) => {
                tracing::error!(%reason, "orchestrator rejected agent token");
                let _ = event_tx.send(Event::AuthRejected { reason }).await;
                return;
            }
            Err(err) => {
                tracing::warn!(addr = %config.addr, %err, "orchestrator connection failed");
            }
        }

        if cmd_rx.is_closed() {
            return;
        }
        attempt = attempt.saturating_add(1);
        let delay = config.reconnect.jittered(attempt);
        tracing::debug!(attempt, ?delay, "reconnect backoff");
        tokio::time::sleep(delay).await;
    }
}

/// Connect, authenticate, and hand back the stream.
async fn establish(
    config: &TransportConfig,
    identity: &AgentIdentity,
) -> Result<TcpStream, TransportError> {
    let connect = TcpStream::connect(&config.addr);
    let mut stream = tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| TransportError::Network("connect timed out".to_string()))??;

    let hello = AgentMessage::Authenticate {
        token: identity.token.clone(),
        capabilities: identity.capabilities.clone(),
    };
    write_message(&mut stream, &hello).await?;

    let reply = tokio::time::timeout(
        config.connect_timeout,
        read_message::<_, OrchestratorMessage>(&mut stream),
    )
    .await
    .map_err(|_| TransportError::Network("auth handshake timed out".to_string()))?;

    match reply? {
        OrchestratorMessage::AuthAck => Ok(stream),
        OrchestratorMessage::AuthReject { reason } => Err(TransportError::Auth(reason)),
        other => Err(TransportError::Network(format!(
            "unexpected frame during auth: {other:?}"
        ))),
    }
}

/// Drive one authenticated connection until it drops.
async fn serve(
    stream: TcpStream,
    cmd_rx: &mut mpsc::Receiver<Cmd>,
    event_tx: &mpsc::Sender<Event>,
) -> ServeEnd {
    let (read_half, mut writer) = stream.into_split();

    // Reader task: parse frames off the socket and forward them. Keeping
    // the parse loop out of the select below means a cancelled branch can
    // never abandon a half-read frame.
    let (incoming_tx, mut incoming_rx) = mpsc::channel::<OrchestratorMessage>(8);
    let reader_task = tokio::spawn(async move {
        let mut reader = read_half;
        loop {
            match read_message::<_, OrchestratorMessage>(&mut reader).await {
                Ok(msg) => {
                    if incoming_tx.send(msg).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    tracing::debug!(%err, "orchestrator read loop ended");
                    return;
                }
            }
        }
    });

    let mut pending_report: Option<(JobId, oneshot::Sender<Result<(), TransportError>>)> = None;
    let mut pending_chunk: Option<(ArtifactId, oneshot::Sender<Result<u64, TransportError>>)> =
        None;

    let end = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => break ServeEnd::CommandsClosed,
                Some(Cmd::SendReport { report, done }) => {
                    let job_id = report.job_id.clone();
                    let msg = AgentMessage::ResultReport { report };
                    if let Err(err) = write_message(&mut writer, &msg).await {
                        let _ = done.send(Err(err.into()));
                        break ServeEnd::ConnectionLost;
                    }
                    if pending_report.replace((job_id, done)).is_some() {
                        tracing::warn!("previous report still unacked; waiter replaced");
                    }
                }
                Some(Cmd::SendChunk { job_id, artifact_id, offset, bytes, done }) => {
                    let msg = AgentMessage::ArtifactChunk {
                        job_id,
                        artifact_id: artifact_id.clone(),
                        offset,
                        bytes,
                    };
                    if let Err(err) = write_message(&mut writer, &msg).await {
                        let _ = done.send(Err(err.into()));
                        break ServeEnd::ConnectionLost;
                    }
                    if pending_chunk.replace((artifact_id, done)).is_some() {
                        tracing::warn!("previous chunk still unacked; waiter replaced");
                    }
                }
            },
            incoming = incoming_rx.recv() => match incoming {
                None => break ServeEnd::ConnectionLost,
                Some(msg) => {
                    route(msg, &mut pending_report, &mut pending_chunk, event_tx).await;
                }
            },
        }
    };

    reader_task.abort();
    shutdown_writer(&mut writer).await;
    fail_pending(pending_report.take(), pending_chunk.take());
    end
}

/// Dispatch one orchestrator frame.
async fn route(
    msg: OrchestratorMessage,
    pending_report: &mut Option<(JobId, oneshot::Sender<Result<(), TransportError>>)>,
    pending_chunk: &mut Option<(ArtifactId, oneshot::Sender<Result<u64, TransportError>>)>,
    event_tx: &mpsc::Sender<Event>,
) {
    match msg {
        OrchestratorMessage::JobAnnouncement { announcement } => {
            let _ = event_tx.send(Event::Announced(announcement)).await;
        }
        OrchestratorMessage::CancelJob { job_id } => {
            let _ = event_tx.send(Event::CancelJob { job_id }).await;
        }
        OrchestratorMessage::ArtifactAck { artifact_id, offset } => {
            match pending_chunk.take() {
                Some((id, done)) if id == artifact_id => {
                    let _ = done.send(Ok(offset));
                }
                Some(other) => {
                    tracing::warn!(acked = %artifact_id, "ack for unexpected artifact");
                    *pending_chunk = Some(other);
                }
                None => tracing::debug!(acked = %artifact_id, "stray artifact ack"),
            }
        }
        OrchestratorMessage::ReportAck { job_id } => match pending_report.take() {
            Some((id, done)) if id == job_id => {
                let _ = done.send(Ok(()));
            }
            Some(other) => {
                tracing::warn!(acked = %job_id, "ack for unexpected report");
                *pending_report = Some(other);
            }
            // Duplicate ack after a resend; the orchestrator already
            // deduplicated by job_id.
            None => tracing::debug!(acked = %job_id, "stray report ack"),
        },
        OrchestratorMessage::AuthAck | OrchestratorMessage::AuthReject { .. } => {
            tracing::warn!("unexpected auth frame outside handshake");
        }
    }
}

/// Fail any in-flight waiters when the connection drops.
fn fail_pending(
    pending_report: Option<(JobId, oneshot::Sender<Result<(), TransportError>>)>,
    pending_chunk: Option<(ArtifactId, oneshot::Sender<Result<u64, TransportError>>)>,
) {
    if let Some((_, done)) = pending_report {
        let _ = done.send(Err(TransportError::Network("connection lost".to_string())));
    }
    if let Some((_, done)) = pending_chunk {
        let _ = done.send(Err(TransportError::Network("connection lost".to_string())));
    }
}

/// Best-effort FIN so the orchestrator sees a clean close.
async fn shutdown_writer(writer: &mut OwnedWriteHalf) {
    use tokio::io::AsyncWriteExt;
    if let Err(err) = writer.shutdown().await {
        tracing::debug!(%err, "socket shutdown failed");
    }
}
