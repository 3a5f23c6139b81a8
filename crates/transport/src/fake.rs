// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory transport for controller tests.

use crate::client::chunk_spans;
use crate::error::TransportError;
use crate::Transport;
use async_trait::async_trait;
use farm_core::{ArtifactHandle, ArtifactId, JobId, ResultReport};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    reports: Vec<ResultReport>,
    /// Every `send_report` call, including failed ones.
    report_attempts: u32,
    /// Fail this many `send_report` calls before succeeding.
    report_failures: u32,
    /// Record the report but fail the call anyway, as if the ack was
    /// lost after the orchestrator processed the send.
    ack_losses: u32,
    /// Chunk spans the fake "received": (artifact, offset, len).
    chunks: Vec<(ArtifactId, u64, u64)>,
    /// Fail an upload after acking this many bytes of the current call.
    upload_failure_after: Option<u64>,
    /// How many upload calls the failure applies to.
    upload_failures: u32,
    chunk_size: u64,
}

/// In-memory [`Transport`] with scriptable failures.
///
/// Uploads never touch the filesystem; they simulate chunked acks from
/// `artifact.size_bytes` so tests can drive resume behavior precisely.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().chunk_size = 1024;
        fake
    }

    pub fn with_chunk_size(self, chunk_size: u64) -> Self {
        self.state.lock().chunk_size = chunk_size.max(1);
        self
    }

    /// Fail the next `times` report sends with a network error.
    pub fn fail_reports(&self, times: u32) {
        self.state.lock().report_failures = times;
    }

    /// Deliver the next `times` reports but fail the ack, so the caller
    /// retries a send the orchestrator already processed.
    pub fn lose_report_acks(&self, times: u32) {
        self.state.lock().ack_losses = times;
    }

    /// Fail the next `times` upload calls once `after_bytes` of that
    /// call's artifact have been acked.
    pub fn fail_uploads_after(&self, after_bytes: u64, times: u32) {
        let mut state = self.state.lock();
        state.upload_failure_after = Some(after_bytes);
        state.upload_failures = times;
    }

    /// Every report received, in send order (including retried sends).
    pub fn reports(&self) -> Vec<ResultReport> {
        self.state.lock().reports.clone()
    }

    /// Send attempts, including ones that failed.
    pub fn report_attempts(&self) -> u32 {
        self.state.lock().report_attempts
    }

    /// Every chunk span received, in send order.
    pub fn chunks(&self) -> Vec<(ArtifactId, u64, u64)> {
        self.state.lock().chunks.clone()
    }

    /// Total bytes acked for one artifact.
    pub fn bytes_received(&self, artifact_id: &ArtifactId) -> u64 {
        self.state
            .lock()
            .chunks
            .iter()
            .filter(|(id, _, _)| id == artifact_id)
            .map(|(_, _, len)| len)
            .sum()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_report(&self, report: &ResultReport) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.report_attempts += 1;
        if state.report_failures > 0 {
            state.report_failures -= 1;
            return Err(TransportError::Network("report send dropped".to_string()));
        }
        state.reports.push(report.clone());
        if state.ack_losses > 0 {
            state.ack_losses -= 1;
            return Err(TransportError::Timeout("report ack"));
        }
        Ok(())
    }

    async fn upload_artifact(
        &self,
        _job_id: &JobId,
        artifact: &ArtifactHandle,
        resume_from: &mut u64,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();

        let fail_at = if state.upload_failures > 0 {
            state.upload_failure_after.map(|after| *resume_from + after)
        } else {
            None
        };

        if artifact.size_bytes == 0 {
            state.chunks.push((artifact.id.clone(), 0, 0));
            return Ok(());
        }

        let spans: Vec<_> =
            chunk_spans(artifact.size_bytes, *resume_from, state.chunk_size as usize).collect();
        for (offset, len) in spans {
            if let Some(fail_at) = fail_at {
                if offset >= fail_at {
                    state.upload_failures -= 1;
                    return Err(TransportError::Network("connection lost".to_string()));
                }
            }
            state.chunks.push((artifact.id.clone(), offset, len as u64));
            *resume_from = offset + len as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
