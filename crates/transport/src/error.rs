// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Token rejected by the orchestrator. Fatal; requires operator
    /// intervention and is never retried.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Connection-level failure. The actor reconnects on its own; the
    /// failed call is the caller's to retry.
    #[error("network error: {0}")]
    Network(String),

    /// No ack arrived within the configured window.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The transport actor has shut down.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Whether the caller may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Auth(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

impl From<farm_wire::ProtocolError> for TransportError {
    fn from(err: farm_wire::ProtocolError) -> Self {
        TransportError::Network(err.to_string())
    }
}
