// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capture error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// A child process could not be started. Environment or
    /// configuration defect; fails the job without retry.
    #[error("failed to launch {what}: {source}")]
    Launch {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// Output locations could not be prepared.
    #[error("capture workspace error at {path}: {source}")]
    Workspace {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
