// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job lifecycle state machine.
//!
//! One logical task owns the single [`JobState`]; the transport actor
//! and the capture supervisor run concurrently and talk to it only
//! through channels and contract calls. No single-job failure escapes
//! this module — every path ends in a best-effort report and a return
//! to idle. The only fatal conditions are authentication rejection and
//! a dead control channel.

use crate::engine::retry::with_retry;
use crate::engine::EngineConfig;
use crate::fetch::{FetchError, PackageFetcher};
use farm_bundle::{Bundle, BundleError};
use farm_capture::{CapturedFile, RunRequest, RunVerdict, Supervisor};
use farm_core::{
    AgentStatus, Clock, Event, JobAnnouncement, JobId, JobPhase, JobState, Outcome, ResultReport,
    RetryPolicy,
};
use farm_transport::{Transport, TransportError};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Conditions the controller cannot recover from. Everything else is
/// absorbed into the current job's report.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("orchestrator rejected agent token: {0}")]
    AuthRejected(String),

    #[error("control event channel closed")]
    ChannelClosed,
}

/// Drives announcements through
/// fetch → execute → package → upload → report, one job at a time.
pub struct Controller<T, S, F, C> {
    transport: T,
    supervisor: S,
    fetcher: F,
    clock: C,
    config: EngineConfig,
    events: mpsc::Receiver<Event>,
    /// False once the transport's event channel has closed.
    events_open: bool,
    status_tx: watch::Sender<AgentStatus>,
    shutdown: CancellationToken,
}

impl<T, S, F, C> Controller<T, S, F, C>
where
    T: Transport,
    S: Supervisor,
    F: PackageFetcher,
    C: Clock,
{
    /// Build a controller. The returned watch receiver is the status
    /// accessor for health checks: current phase plus job id, if any.
    pub fn new(
        transport: T,
        supervisor: S,
        fetcher: F,
        clock: C,
        config: EngineConfig,
        events: mpsc::Receiver<Event>,
        shutdown: CancellationToken,
    ) -> (Self, watch::Receiver<AgentStatus>) {
        let (status_tx, status_rx) = watch::channel(AgentStatus::idle());
        let controller = Self {
            transport,
            supervisor,
            fetcher,
            clock,
            config,
            events,
            events_open: true,
            status_tx,
            shutdown,
        };
        (controller, status_rx)
    }

    /// Main loop: block on announcements, run one job at a time.
    ///
    /// Announcements are processed strictly after the prior job has
    /// returned to idle; one arriving mid-job is rejected with a
    /// warning, never queued.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        tracing::info!("job controller started");
        loop {
            let announcement = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("shutdown requested; controller stopping");
                    return Ok(());
                }
                event = self.events.recv() => match event {
                    None => return Err(ControllerError::ChannelClosed),
                    Some(Event::Announced(announcement)) => announcement,
                    Some(Event::AuthRejected { reason }) => {
                        return Err(ControllerError::AuthRejected(reason));
                    }
                    Some(Event::CancelJob { job_id }) => {
                        tracing::debug!(job = %job_id, "cancel for inactive job ignored");
                        continue;
                    }
                    Some(Event::Connected) => {
                        tracing::debug!("transport connected");
                        continue;
                    }
                    Some(Event::ConnectionLost) => {
                        tracing::debug!("transport reconnecting");
                        continue;
                    }
                },
            };

            if let Some(fatal) = self.run_job(announcement).await {
                return Err(fatal);
            }
        }
    }

    /// Run one job to completion. Returns a fatal error observed along
    /// the way, if any; job-level failures are absorbed into the report.
    async fn run_job(&mut self, announcement: JobAnnouncement) -> Option<ControllerError> {
        let Controller {
            transport,
            supervisor,
            fetcher,
            clock,
            config,
            events,
            events_open,
            status_tx,
            shutdown,
        } = self;

        let mut fatal: Option<ControllerError> = None;
        let cancel = CancellationToken::new();

        // Process shutdown cancels the active job through the same path
        // as an orchestrator CancelJob.
        let shutdown_link = {
            let cancel = cancel.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                cancel.cancel();
            })
        };

        let mut state = JobState::new(&announcement, clock);
        let job_id = state.job_id.clone();
        set_phase(&mut state, status_tx, JobPhase::Fetching);
        tracing::info!(job = %job_id, package = %state.package, "job accepted");

        let job_dir = config.work_dir.join(job_dir_name(&job_id));
        let package_dest = job_dir.join("package");
        let capture_dir = job_dir.join("capture");
        let bundle_dir = job_dir.join("bundle");

        let mut failed = false;

        // ── Fetching ─────────────────────────────────────────────────
        let mut package_dir: Option<PathBuf> = None;
        if !cancelled(&mut state, &cancel) {
            let policy = &config.fetch_retry;
            let fetcher = &*fetcher;
            let reference = announcement.package.as_str();
            let dest = package_dest.as_path();
            let cancel_ref = &cancel;
            let fut = async move {
                tokio::select! {
                    fetched = with_retry(policy, "fetch", FetchError::is_transient, move || {
                        fetcher.fetch(reference, dest)
                    }) => Some(fetched),
                    _ = cancel_ref.cancelled() => None,
                }
            };
            match drive(events, events_open, &job_id, &cancel, &mut fatal, fut).await {
                Some(Ok(dir)) => package_dir = Some(dir),
                Some(Err(err)) => {
                    state.record_error(clock.epoch_ms(), format!("package fetch failed: {err}"));
                    failed = true;
                }
                // Cancelled mid-fetch; the terminal marker below routes
                // to Aborted.
                None => {}
            }
        }

        // ── Executing ────────────────────────────────────────────────
        let mut files: Vec<CapturedFile> = Vec::new();
        if !failed && !cancelled(&mut state, &cancel) {
            if let Some(dir) = package_dir {
                set_phase(&mut state, status_tx, JobPhase::Executing);
                let req = RunRequest {
                    job_id: job_id.clone(),
                    target: announcement.target.clone(),
                    package_dir: dir,
                    output_dir: capture_dir.clone(),
                    budget: config.budget,
                };
                let fut = supervisor.run(&req, &cancel);
                match drive(events, events_open, &job_id, &cancel, &mut fatal, fut).await {
                    Ok(report) => {
                        match &report.verdict {
                            RunVerdict::Completed { exit_code: 0 } => {
                                state.outcome = Some(Outcome::Success);
                            }
                            RunVerdict::Completed { exit_code } => {
                                state.outcome = Some(Outcome::Failure);
                                state.record_error(
                                    clock.epoch_ms(),
                                    format!("target exited with code {exit_code}"),
                                );
                            }
                            RunVerdict::Crashed { exit_code } => {
                                state.outcome = Some(Outcome::Failure);
                                let detail = match exit_code {
                                    Some(code) => format!("exit code {code}"),
                                    None => "killed by signal".to_string(),
                                };
                                state.record_error(
                                    clock.epoch_ms(),
                                    format!("target crashed before teardown ({detail})"),
                                );
                            }
                            RunVerdict::TimedOut => {
                                state.outcome = Some(Outcome::Timeout);
                                state.record_error(
                                    clock.epoch_ms(),
                                    format!(
                                        "execution exceeded the {}s budget",
                                        config.budget.as_secs()
                                    ),
                                );
                            }
                            RunVerdict::Cancelled => {
                                state.record_error(
                                    clock.epoch_ms(),
                                    "cancelled during execution".to_string(),
                                );
                            }
                        }
                        files = report.files;
                    }
                    Err(err) => {
                        state.record_error(clock.epoch_ms(), err.to_string());
                        failed = true;
                    }
                }
            }
        }

        // ── Terminal marker for failure/cancellation ─────────────────
        // Either way the remaining phases still run: partial evidence is
        // packaged and a best-effort report always goes out.
        if failed {
            if state.outcome.is_none() {
                state.outcome = Some(Outcome::Failure);
            }
            set_phase(&mut state, status_tx, JobPhase::Failed);
        } else if cancelled(&mut state, &cancel) {
            state.outcome = Some(Outcome::Aborted);
            set_phase(&mut state, status_tx, JobPhase::Aborted);
        }

        // ── Packaging ────────────────────────────────────────────────
        let mut bundle: Option<Bundle> = None;
        if !files.is_empty() {
            advance(&mut state, status_tx, JobPhase::Packaging);
            match package_artifacts(&mut state, &files, &bundle_dir, clock.epoch_ms()) {
                Ok(packaged) => bundle = Some(packaged),
                Err(err) => {
                    state.record_error(clock.epoch_ms(), format!("packaging failed: {err}"));
                    mark_failed(&mut state, status_tx);
                }
            }
        }

        // ── Uploading ────────────────────────────────────────────────
        if bundle.is_some() {
            advance(&mut state, status_tx, JobPhase::Uploading);
            let transport = &*transport;
            let policy = &config.upload_retry;
            let artifacts = &state.artifacts;
            let cancel_ref = &cancel;
            let id_ref = &job_id;
            let fut = upload_all(transport, policy, id_ref, artifacts, cancel_ref);
            match drive(events, events_open, &job_id, &cancel, &mut fatal, fut).await {
                UploadEnd::Done => {}
                UploadEnd::Cancelled => {
                    state.record_error(clock.epoch_ms(), "cancelled during upload".to_string());
                    if matches!(state.outcome, None | Some(Outcome::Success)) {
                        state.outcome = Some(Outcome::Aborted);
                    }
                    advance(&mut state, status_tx, JobPhase::Aborted);
                }
                UploadEnd::Exhausted { artifact, at, err } => {
                    state.record_error(
                        clock.epoch_ms(),
                        format!("artifact {artifact} upload incomplete at byte {at}: {err}"),
                    );
                    mark_failed(&mut state, status_tx);
                }
            }
        }

        // ── Reporting ────────────────────────────────────────────────
        // Always: however the job ended, the orchestrator learns the
        // outcome rather than silence.
        advance(&mut state, status_tx, JobPhase::Reporting);
        let manifest = bundle
            .as_ref()
            .map(|b| b.manifest.entries.clone())
            .unwrap_or_default();
        let report = ResultReport::from_state(&state, manifest);
        {
            let transport = &*transport;
            let report_ref = &report;
            let fut = with_retry(
                &config.report_retry,
                "report",
                TransportError::is_transient,
                move || transport.send_report(report_ref),
            );
            match drive(events, events_open, &job_id, &cancel, &mut fatal, fut).await {
                Ok(()) => {
                    tracing::info!(job = %job_id, outcome = %report.outcome, "result report acknowledged");
                }
                Err(err) => {
                    // Abandon locally; the orchestrator's own job timeout
                    // is the backstop for lost reports.
                    tracing::warn!(job = %job_id, %err, "report abandoned after bounded retries");
                }
            }
        }

        // ── Cleanup ──────────────────────────────────────────────────
        shutdown_link.abort();
        if let Err(err) = std::fs::remove_dir_all(&job_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(job = %job_id, %err, "job workspace cleanup failed");
            }
        }
        let _ = status_tx.send_replace(AgentStatus::idle());
        tracing::info!(job = %job_id, "job finished; controller idle");
        fatal
    }
}

/// How the upload phase ended.
enum UploadEnd {
    Done,
    Cancelled,
    Exhausted {
        artifact: farm_core::ArtifactId,
        at: u64,
        err: TransportError,
    },
}

/// Upload every artifact, resuming each from its last acked offset
/// across retry attempts.
async fn upload_all<T: Transport>(
    transport: &T,
    policy: &RetryPolicy,
    job_id: &JobId,
    artifacts: &[farm_core::ArtifactHandle],
    cancel: &CancellationToken,
) -> UploadEnd {
    for artifact in artifacts {
        let mut progress: u64 = 0;
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return UploadEnd::Cancelled;
            }
            attempt += 1;
            match transport.upload_artifact(job_id, artifact, &mut progress).await {
                Ok(()) => {
                    tracing::debug!(artifact = %artifact.id, "artifact uploaded");
                    break;
                }
                Err(err) if err.is_transient() && !policy.is_exhausted(attempt) => {
                    let delay = policy.jittered(attempt);
                    tracing::warn!(
                        artifact = %artifact.id,
                        attempt,
                        resume_from = progress,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "upload interrupted; will resume"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return UploadEnd::Exhausted { artifact: artifact.id.clone(), at: progress, err };
                }
            }
        }
    }
    UploadEnd::Done
}

/// Hash captured files into artifact handles, record them (discarding
/// logged duplicates), and package the bundle.
fn package_artifacts(
    state: &mut JobState,
    files: &[CapturedFile],
    bundle_dir: &Path,
    epoch_ms: u64,
) -> Result<Bundle, BundleError> {
    for file in files {
        let handle = farm_bundle::artifact_from_file(file.kind, &file.path)?;
        if let Err(duplicate) = state.record_artifact(handle) {
            tracing::warn!(artifact = %duplicate, path = %file.path.display(), "duplicate artifact discarded");
        }
    }
    let created_at = chrono::DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_default();
    farm_bundle::package(state, bundle_dir, created_at)
}

/// Await `fut` while pumping control events for the active job.
///
/// Cancels observe immediately through the job's token; announcements
/// arriving mid-job are rejected here (at-most-one job, never queued);
/// auth rejection is remembered as fatal and also cancels the job so
/// teardown runs before the controller exits.
async fn drive<Fut: Future>(
    events: &mut mpsc::Receiver<Event>,
    events_open: &mut bool,
    active_job: &JobId,
    cancel: &CancellationToken,
    fatal: &mut Option<ControllerError>,
    fut: Fut,
) -> Fut::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            event = events.recv(), if *events_open => match event {
                None => {
                    *events_open = false;
                    fatal.get_or_insert(ControllerError::ChannelClosed);
                    cancel.cancel();
                }
                Some(event) => handle_mid_job_event(event, active_job, cancel, fatal),
            },
        }
    }
}

fn handle_mid_job_event(
    event: Event,
    active_job: &JobId,
    cancel: &CancellationToken,
    fatal: &mut Option<ControllerError>,
) {
    match event {
        Event::CancelJob { job_id } if &job_id == active_job => {
            tracing::info!(job = %job_id, "cancel requested by orchestrator");
            cancel.cancel();
        }
        Event::CancelJob { job_id } => {
            tracing::debug!(job = %job_id, "cancel for a different job ignored");
        }
        Event::Announced(announcement) => {
            tracing::warn!(
                job = %announcement.job_id,
                active = %active_job,
                "announcement rejected: a job is already active"
            );
        }
        Event::ConnectionLost => {
            // Keep executing; uploading and reporting retry against the
            // reconnected transport.
            tracing::warn!("connection lost mid-job; execution continues");
        }
        Event::Connected => {
            tracing::debug!("transport reconnected mid-job");
        }
        Event::AuthRejected { reason } => {
            tracing::error!(%reason, "auth rejected mid-job; winding the job down");
            fatal.get_or_insert(ControllerError::AuthRejected(reason));
            cancel.cancel();
        }
    }
}

/// Check-and-latch the job's cancel flag.
fn cancelled(state: &mut JobState, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        state.cancel_requested = true;
    }
    state.cancel_requested
}

fn set_phase(state: &mut JobState, status_tx: &watch::Sender<AgentStatus>, phase: JobPhase) {
    state.phase = phase;
    let _ = status_tx.send_replace(AgentStatus::active(&state.job_id, phase));
    tracing::info!(job = %state.job_id, %phase, "phase transition");
}

/// Like [`set_phase`], but a job already marked Failed/Aborted keeps its
/// terminal phase while teardown continues through it.
fn advance(state: &mut JobState, status_tx: &watch::Sender<AgentStatus>, phase: JobPhase) {
    if !matches!(state.phase, JobPhase::Failed | JobPhase::Aborted) {
        set_phase(state, status_tx, phase);
    }
}

/// Fail the job without clobbering an already-settled timeout/abort
/// outcome.
fn mark_failed(state: &mut JobState, status_tx: &watch::Sender<AgentStatus>) {
    if matches!(state.outcome, None | Some(Outcome::Success)) {
        state.outcome = Some(Outcome::Failure);
    }
    if state.phase != JobPhase::Aborted {
        set_phase(state, status_tx, JobPhase::Failed);
    }
}

/// Job ids are opaque orchestrator strings; keep workspace names tame.
fn job_dir_name(job_id: &JobId) -> String {
    let safe: String = job_id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    format!("job-{safe}")
}
