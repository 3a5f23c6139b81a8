// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target application launch parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for launching the target application, supplied by the job
/// announcement and treated as opaque by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Program to execute (firmware loader, emulator binary, test runner...).
    pub program: String,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the target process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Test entry point inside the package, exported as `FARM_ENTRY_POINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl TargetConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), env: HashMap::new(), entry_point: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}
