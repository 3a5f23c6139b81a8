// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller tests against fake transport/supervisor/fetcher.
//!
//! All tests run under paused tokio time, so scripted run times and
//! backoff sleeps are virtual.

mod cancel;
mod failures;
mod lifecycle;
mod upload;

use crate::engine::{Controller, ControllerError, EngineConfig};
use crate::fetch::{FetchError, PackageFetcher};
use async_trait::async_trait;
use farm_capture::{FakePlan, FakeSupervisor};
use farm_core::{
    AgentStatus, Event, FakeClock, JobAnnouncement, JobPhase, Outcome, ResultReport, RetryPolicy,
    TargetConfig,
};
use farm_transport::FakeTransport;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Scriptable package fetcher backed by a temp directory.
#[derive(Clone, Default)]
pub(crate) struct FakeFetcher {
    fail_times: Arc<Mutex<u32>>,
    not_found: Arc<Mutex<bool>>,
    calls: Arc<AtomicU32>,
}

impl FakeFetcher {
    pub(crate) fn fail_times(&self, times: u32) {
        *self.fail_times.lock() = times;
    }

    pub(crate) fn always_not_found(&self) {
        *self.not_found.lock() = true;
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.not_found.lock() {
            return Err(FetchError::NotFound(reference.to_string()));
        }
        {
            let mut fails = self.fail_times.lock();
            if *fails > 0 {
                *fails -= 1;
                return Err(FetchError::Network("repository unreachable".to_string()));
            }
        }
        std::fs::create_dir_all(dest)
            .map_err(|source| FetchError::Io { path: dest.to_path_buf(), source })?;
        std::fs::write(dest.join("suite.cfg"), b"suite")
            .map_err(|source| FetchError::Io { path: dest.to_path_buf(), source })?;
        Ok(dest.to_path_buf())
    }
}

pub(crate) struct Harness {
    pub events: mpsc::Sender<Event>,
    pub transport: FakeTransport,
    pub supervisor: FakeSupervisor,
    pub fetcher: FakeFetcher,
    pub status: watch::Receiver<AgentStatus>,
    pub shutdown: CancellationToken,
    pub task: tokio::task::JoinHandle<Result<(), ControllerError>>,
    _work: TempDir,
}

impl Harness {
    pub(crate) fn new(plan: FakePlan) -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);
        let transport = FakeTransport::new().with_chunk_size(1024);
        let supervisor = FakeSupervisor::new(plan);
        let fetcher = FakeFetcher::default();
        let work = TempDir::new().unwrap();
        let config = EngineConfig {
            work_dir: work.path().join("jobs"),
            budget: Duration::from_secs(120),
            fetch_retry: RetryPolicy::new(3, ms(10), ms(100)),
            upload_retry: RetryPolicy::new(3, ms(10), ms(100)),
            report_retry: RetryPolicy::new(3, ms(10), ms(100)),
        };
        let shutdown = CancellationToken::new();
        let (controller, status) = Controller::new(
            transport.clone(),
            supervisor.clone(),
            fetcher.clone(),
            FakeClock::new(),
            config,
            event_rx,
            shutdown.clone(),
        );
        let task = tokio::spawn(controller.run());
        Self {
            events: event_tx,
            transport,
            supervisor,
            fetcher,
            status,
            shutdown,
            task,
            _work: work,
        }
    }

    pub(crate) fn announcement(job_id: &str) -> JobAnnouncement {
        JobAnnouncement {
            job_id: job_id.into(),
            package: "pkg://suite-7".to_string(),
            target: TargetConfig::new("/opt/target/run"),
        }
    }

    pub(crate) async fn announce(&self, job_id: &str) {
        self.events.send(Event::Announced(Self::announcement(job_id))).await.unwrap();
    }

    pub(crate) async fn wait_phase(&mut self, phase: JobPhase) {
        self.status.wait_for(|s| s.phase == phase).await.unwrap();
    }

    /// Run a single announced job start to finish.
    ///
    /// Completion is detected by a new report attempt plus a return to
    /// idle — fast phases can coalesce on the status watch, so watching
    /// phases alone would race.
    pub(crate) async fn run_one(&mut self, job_id: &str) {
        let before = self.transport.report_attempts();
        self.announce(job_id).await;
        for _ in 0..100_000 {
            if self.transport.report_attempts() > before
                && self.status.borrow().phase == JobPhase::Idle
            {
                return;
            }
            tokio::time::sleep(ms(1)).await;
        }
        panic!("job {job_id} never completed");
    }

    pub(crate) fn sole_report(&self) -> ResultReport {
        let reports = self.transport.reports();
        assert_eq!(reports.len(), 1, "expected exactly one report, got {reports:?}");
        reports.into_iter().next().unwrap()
    }

    pub(crate) async fn finish(self) -> Result<(), ControllerError> {
        self.shutdown.cancel();
        self.task.await.unwrap()
    }
}
