// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity presented to the orchestrator.

use serde::{Deserialize, Serialize};

/// Immutable identity established at startup and used for every
/// orchestrator exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Opaque authentication token issued by the pool operator.
    pub token: String,
    /// Capability tags the orchestrator matches jobs against
    /// (e.g. platform, GPU class, attached hardware).
    pub capabilities: Vec<String>,
}

impl AgentIdentity {
    pub fn new(token: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self { token: token.into(), capabilities }
    }
}
