// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact handles and manifest entries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for an artifact produced during a job.
    ///
    /// Generated locally when the artifact is recorded; referenced by the
    /// upload protocol and the bundle manifest.
    pub struct ArtifactId("art-");
}

/// What an artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Screen+audio recording of the run
    Video,
    /// Captured process output
    Log,
    /// Structured results written by the target
    ResultData,
}

crate::simple_display! {
    ArtifactKind {
        Video => "video",
        Log => "log",
        ResultData => "result-data",
    }
}

/// Reference to a finalized artifact file.
///
/// Ownership transfers to the transport once upload begins; the file and
/// checksum must not change after the handle is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    /// Absolute path of the backing file.
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the final byte content.
    pub checksum: String,
}

impl ArtifactHandle {
    /// File name component of the backing path, lossy-decoded.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// One row of a bundle or report manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub artifact_id: ArtifactId,
    pub kind: ArtifactKind,
    pub file_name: String,
    pub size_bytes: u64,
    pub checksum: String,
}

impl From<&ArtifactHandle> for ManifestEntry {
    fn from(handle: &ArtifactHandle) -> Self {
        Self {
            artifact_id: handle.id.clone(),
            kind: handle.kind,
            file_name: handle.file_name(),
            size_bytes: handle.size_bytes,
            checksum: handle.checksum.clone(),
        }
    }
}

crate::builder! {
    pub struct ArtifactHandleBuilder => ArtifactHandle {
        into {
            kind: ArtifactKind = ArtifactKind::Log,
            path: PathBuf = "/tmp/test/target.log",
            checksum: String = "0000",
        }
        set {
            id: ArtifactId = ArtifactId::new(),
            size_bytes: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
