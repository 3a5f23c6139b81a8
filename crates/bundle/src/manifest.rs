// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundle manifest: the descriptive half of an upload-ready bundle.

use chrono::{DateTime, Utc};
use farm_core::{ErrorEntry, JobId, ManifestEntry};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Describes every artifact in a bundle plus the job's failure log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
    /// The job's ordered failure log, embedded so the bundle is
    /// self-describing even when the report is lost.
    pub error_log: Vec<ErrorEntry>,
}
