// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent process configuration.
//!
//! Precedence: TOML file < `FARM_*` environment < CLI flags (applied by
//! the binary).

use crate::engine::EngineConfig;
use farm_capture::{ProcessSupervisor, RecorderConfig};
use farm_core::{AgentIdentity, RetryPolicy};
use farm_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no agent token configured (set `token`, FARM_TOKEN, or --token-file)")]
    MissingToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Orchestrator address, `host:port`.
    pub orchestrator: String,
    /// Agent token. Usually supplied via FARM_TOKEN or --token-file
    /// rather than inline.
    pub token: String,
    pub capabilities: Vec<String>,
    /// Job workspaces live here, one directory per job.
    pub work_dir: PathBuf,
    /// Rolling log files. Defaults next to `work_dir`.
    pub log_dir: PathBuf,

    /// Wall-clock budget per job, seconds.
    pub job_budget_secs: u64,
    /// Surface readiness grace before recording starts, seconds.
    pub ready_grace_secs: u64,
    /// Teardown grace per signal, seconds.
    pub stop_grace_secs: u64,
    pub connect_timeout_secs: u64,
    pub ack_timeout_secs: u64,
    /// Raw bytes per artifact chunk.
    pub chunk_size: usize,

    pub recorder: RecorderConfig,

    pub fetch_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
    pub report_retry: RetryPolicy,
    pub reconnect: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("farm");
        Self {
            orchestrator: "127.0.0.1:7700".to_string(),
            token: String::new(),
            capabilities: vec![std::env::consts::OS.to_string()],
            work_dir: state_dir.join("jobs"),
            log_dir: state_dir.join("logs"),
            job_budget_secs: 300,
            ready_grace_secs: 5,
            stop_grace_secs: 10,
            connect_timeout_secs: 10,
            ack_timeout_secs: 30,
            chunk_size: 256 * 1024,
            recorder: RecorderConfig::default(),
            fetch_retry: RetryPolicy::default(),
            upload_retry: RetryPolicy::default(),
            report_retry: RetryPolicy::new(
                5,
                Duration::from_secs(1),
                Duration::from_secs(60),
            ),
            reconnect: RetryPolicy::new(
                u32::MAX,
                Duration::from_millis(500),
                Duration::from_secs(30),
            ),
        }
    }
}

impl AgentConfig {
    /// Load from a TOML file, falling back to defaults per field.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Apply `FARM_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("FARM_ORCHESTRATOR") {
            self.orchestrator = addr;
        }
        if let Ok(token) = std::env::var("FARM_TOKEN") {
            self.token = token;
        }
        if let Ok(dir) = std::env::var("FARM_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Ok(caps) = std::env::var("FARM_CAPABILITIES") {
            self.capabilities = caps.split(',').map(|c| c.trim().to_string()).collect();
        }
    }

    /// Validate the parts the agent cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }

    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(self.token.clone(), self.capabilities.clone())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            addr: self.orchestrator.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
            chunk_size: self.chunk_size,
            reconnect: self.reconnect.clone(),
        }
    }

    pub fn supervisor(&self) -> ProcessSupervisor {
        ProcessSupervisor {
            recorder: self.recorder.clone(),
            ready_grace: Duration::from_secs(self.ready_grace_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            work_dir: self.work_dir.clone(),
            budget: Duration::from_secs(self.job_budget_secs),
            fetch_retry: self.fetch_retry.clone(),
            upload_retry: self.upload_retry.clone(),
            report_retry: self.report_retry.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
