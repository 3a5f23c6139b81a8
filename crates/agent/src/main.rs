// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! farmd: Testfarm worker agent process.

use anyhow::Context;
use clap::Parser;
use farm_agent::{AgentConfig, Controller, RepoFetcher};
use farm_core::SystemClock;
use farm_transport::TcpTransport;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "farmd", about = "Testfarm worker agent", version)]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Orchestrator address (host:port).
    #[arg(long)]
    orchestrator: Option<String>,

    /// Read the agent token from this file.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Job workspace directory.
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    config.apply_env();
    if let Some(orchestrator) = args.orchestrator {
        config.orchestrator = orchestrator;
    }
    if let Some(path) = &args.token_file {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read token file {}", path.display()))?;
        config.token = token.trim().to_string();
    }
    if let Some(work_dir) = args.work_dir {
        config.work_dir = work_dir;
    }
    config.validate()?;

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("cannot create work dir {}", config.work_dir.display()))?;
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("cannot create log dir {}", config.log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "farmd.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("FARM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    tracing::info!(
        orchestrator = %config.orchestrator,
        capabilities = ?config.capabilities,
        work_dir = %config.work_dir.display(),
        "farmd starting"
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; cancelling active job");
                shutdown.cancel();
            }
        });
    }

    let (event_tx, event_rx) = mpsc::channel(16);
    let (transport, transport_task) =
        TcpTransport::spawn(config.transport(), config.identity(), event_tx);

    let (controller, status) = Controller::new(
        transport,
        config.supervisor(),
        RepoFetcher::new(),
        SystemClock,
        config.engine(),
        event_rx,
        shutdown.clone(),
    );
    // Health surface for the hosting environment: the current phase and
    // job land in the log on every change.
    tokio::spawn(async move {
        let mut status = status;
        while status.changed().await.is_ok() {
            let snapshot = status.borrow().clone();
            tracing::debug!(phase = %snapshot.phase, job = ?snapshot.job_id, "status");
        }
    });

    let result = controller.run().await;
    transport_task.abort();
    result.context("agent stopped")
}
