// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! farm-capture: supervised execution of the target application with
//! screen+audio recording.
//!
//! The target and the recorder are two independently supervised child
//! processes bound by a shared wall-clock deadline. Ordering is fixed:
//! the recorder starts only after the target's surface had its readiness
//! grace, and always stops before the target is torn down so captures
//! are finalized rather than truncated by a dying display.

mod error;
mod proc;
mod recorder;
mod supervisor;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use error::CaptureError;
pub use recorder::RecorderConfig;
pub use supervisor::{
    CaptureReport, CapturedFile, ProcessSupervisor, RunRequest, RunVerdict, Supervisor,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePlan, FakeSupervisor};
