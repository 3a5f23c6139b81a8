// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result report sent to the orchestrator.

use crate::artifact::ManifestEntry;
use crate::job::{JobId, JobState, Outcome};
use serde::{Deserialize, Serialize};

/// Final report for one job.
///
/// Constructed exactly once per job; retried sends carry the same
/// content, never mutated, so the orchestrator can deduplicate by
/// `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    pub job_id: JobId,
    pub outcome: Outcome,
    pub manifest: Vec<ManifestEntry>,
    pub diagnostic_summary: String,
}

impl ResultReport {
    /// Build the report from the job's final state.
    ///
    /// `manifest` lists the artifacts actually available for the
    /// orchestrator — possibly fewer than captured when packaging or
    /// upload degraded.
    pub fn from_state(state: &JobState, manifest: Vec<ManifestEntry>) -> Self {
        Self {
            job_id: state.job_id.clone(),
            outcome: state.effective_outcome(),
            manifest,
            diagnostic_summary: state.diagnostic_summary(),
        }
    }
}
