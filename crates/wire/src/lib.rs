// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator protocol for the Testfarm agent.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod message;

pub use codec::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_SIZE};
pub use message::{AgentMessage, OrchestratorMessage};

#[cfg(test)]
mod property_tests;
