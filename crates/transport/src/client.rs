// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`Transport`] contract and its TCP implementation.

use crate::actor;
use crate::error::TransportError;
use async_trait::async_trait;
use farm_core::{
    AgentIdentity, ArtifactHandle, ArtifactId, Event, JobId, ResultReport, RetryPolicy,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Contract the Job Controller drives uploads and reporting through.
///
/// Implementations never retry internally; a failed call surfaces a
/// [`TransportError`] and the caller applies its own retry policy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a result report and await the orchestrator's ack.
    async fn send_report(&self, report: &ResultReport) -> Result<(), TransportError>;

    /// Stream an artifact's bytes, resuming from `resume_from`.
    ///
    /// `resume_from` advances to each acked offset, so after a failed
    /// call it holds the last byte the orchestrator confirmed and a
    /// retried call picks up from there instead of from zero.
    async fn upload_artifact(
        &self,
        job_id: &JobId,
        artifact: &ArtifactHandle,
        resume_from: &mut u64,
    ) -> Result<(), TransportError>;
}

/// Connection parameters for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Orchestrator address, `host:port`.
    pub addr: String,
    pub connect_timeout: Duration,
    /// Window for a single report/chunk ack.
    pub ack_timeout: Duration,
    /// Raw bytes per artifact chunk.
    pub chunk_size: usize,
    /// Backoff curve for reconnects. `max_attempts` is ignored here —
    /// the actor reconnects until shut down.
    pub reconnect: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7700".to_string(),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(30),
            chunk_size: 256 * 1024,
            reconnect: RetryPolicy::default(),
        }
    }
}

/// Commands from the client handle to the connection actor.
pub(crate) enum Cmd {
    SendReport {
        report: ResultReport,
        done: oneshot::Sender<Result<(), TransportError>>,
    },
    SendChunk {
        job_id: JobId,
        artifact_id: ArtifactId,
        offset: u64,
        bytes: Vec<u8>,
        /// Resolved with the acked offset.
        done: oneshot::Sender<Result<u64, TransportError>>,
    },
}

/// Handle to the connection actor.
///
/// Cheap to clone; the actor and the socket live in a background task.
#[derive(Clone)]
pub struct TcpTransport {
    cmd_tx: mpsc::Sender<Cmd>,
    ack_timeout: Duration,
    chunk_size: usize,
}

impl TcpTransport {
    /// Start the connection actor. Events (announcements, cancels,
    /// connectivity changes, auth rejection) arrive on `event_tx`.
    pub fn spawn(
        config: TransportConfig,
        identity: AgentIdentity,
        event_tx: mpsc::Sender<Event>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let ack_timeout = config.ack_timeout;
        let chunk_size = config.chunk_size;
        let task = tokio::spawn(actor::run(config, identity, event_tx, cmd_rx));
        (Self { cmd_tx, ack_timeout, chunk_size }, task)
    }

    async fn roundtrip<T>(
        &self,
        cmd: Cmd,
        rx: oneshot::Receiver<Result<T, TransportError>>,
        what: &'static str,
    ) -> Result<T, TransportError> {
        self.cmd_tx.send(cmd).await.map_err(|_| TransportError::Closed)?;
        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout(what)),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_report(&self, report: &ResultReport) -> Result<(), TransportError> {
        let (done, rx) = oneshot::channel();
        let cmd = Cmd::SendReport { report: report.clone(), done };
        self.roundtrip(cmd, rx, "report ack").await
    }

    async fn upload_artifact(
        &self,
        job_id: &JobId,
        artifact: &ArtifactHandle,
        resume_from: &mut u64,
    ) -> Result<(), TransportError> {
        let mut file = tokio::fs::File::open(&artifact.path).await?;

        // Zero-length artifacts still announce themselves with one empty
        // chunk so the orchestrator registers the artifact.
        if artifact.size_bytes == 0 {
            let (done, rx) = oneshot::channel();
            let cmd = Cmd::SendChunk {
                job_id: job_id.clone(),
                artifact_id: artifact.id.clone(),
                offset: 0,
                bytes: Vec::new(),
                done,
            };
            self.roundtrip(cmd, rx, "artifact ack").await?;
            return Ok(());
        }

        file.seek(std::io::SeekFrom::Start(*resume_from)).await?;

        for (offset, len) in chunk_spans(artifact.size_bytes, *resume_from, self.chunk_size) {
            let mut bytes = vec![0u8; len];
            file.read_exact(&mut bytes).await?;

            let (done, rx) = oneshot::channel();
            let cmd = Cmd::SendChunk {
                job_id: job_id.clone(),
                artifact_id: artifact.id.clone(),
                offset,
                bytes,
                done,
            };
            let acked = self.roundtrip(cmd, rx, "artifact ack").await?;
            *resume_from = acked;
        }

        tracing::debug!(artifact = %artifact.id, bytes = artifact.size_bytes, "artifact upload complete");
        Ok(())
    }
}

/// Chunk layout for an upload resuming at `from`: `(offset, len)` pairs.
pub(crate) fn chunk_spans(
    size: u64,
    from: u64,
    chunk_size: usize,
) -> impl Iterator<Item = (u64, usize)> {
    let chunk = chunk_size.max(1) as u64;
    let mut offset = from;
    std::iter::from_fn(move || {
        if offset >= size {
            return None;
        }
        let len = chunk.min(size - offset);
        let span = (offset, len as usize);
        offset += len;
        Some(span)
    })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
