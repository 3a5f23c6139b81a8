// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control events delivered from the transport to the Job Controller.

use crate::job::{JobAnnouncement, JobId};
use serde::{Deserialize, Serialize};

/// Messages flowing over the transport → controller channel.
///
/// The controller never touches the connection; everything it learns
/// from the orchestrator arrives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Connection established and authenticated.
    Connected,
    /// Connection dropped; the transport is reconnecting with backoff.
    ConnectionLost,
    /// The orchestrator rejected our token on a reconnect. Fatal —
    /// surfaced for operator intervention, never retried.
    AuthRejected { reason: String },
    /// A job was assigned to this agent.
    Announced(JobAnnouncement),
    /// The orchestrator cancelled a job.
    CancelJob { job_id: JobId },
}
