// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages, split by direction.

use farm_core::{ArtifactId, JobAnnouncement, JobId, ResultReport};
use serde::{Deserialize, Serialize};

/// Messages sent by the agent to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AgentMessage {
    /// First frame on every connection. Re-sent after each reconnect.
    Authenticate {
        token: String,
        capabilities: Vec<String>,
    },

    /// Final report for a job. Identical content on every retried send;
    /// the orchestrator deduplicates by `job_id`.
    ResultReport { report: ResultReport },

    /// One slice of an artifact's byte stream.
    ArtifactChunk {
        job_id: JobId,
        artifact_id: ArtifactId,
        /// Byte offset of this chunk within the artifact.
        offset: u64,
        /// Chunk payload, base64-encoded in the JSON frame.
        #[serde(with = "b64")]
        bytes: Vec<u8>,
    },
}

/// Messages sent by the orchestrator to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OrchestratorMessage {
    /// Token accepted; announcements may follow.
    AuthAck,

    /// Token rejected. Fatal for the agent process.
    AuthReject { reason: String },

    /// A job assigned to this agent.
    JobAnnouncement { announcement: JobAnnouncement },

    /// Cancel a previously announced job.
    CancelJob { job_id: JobId },

    /// Confirms receipt of every artifact byte up to and including the
    /// chunk that ended at `offset`.
    ArtifactAck { artifact_id: ArtifactId, offset: u64 },

    /// Confirms receipt of a job's result report.
    ReportAck { job_id: JobId },
}

/// Serialize chunk payloads as base64 strings.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
