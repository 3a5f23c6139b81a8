// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake orchestrator for transport specs.

use farm_core::{ArtifactId, ResultReport};
use farm_wire::{read_message, write_message, AgentMessage, OrchestratorMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub const GOOD_TOKEN: &str = "tok-good";

#[derive(Default)]
struct State {
    auths: u32,
    reports: Vec<ResultReport>,
    /// Assembled artifact bytes, written at chunk offsets.
    artifacts: HashMap<ArtifactId, Vec<u8>>,
    /// Offsets of every acked chunk, in arrival order.
    acked_offsets: Vec<u64>,
    /// Ack this many chunks, then drop the connection once.
    ack_before_drop: Option<u32>,
    dropped: bool,
    outbox: Option<mpsc::UnboundedSender<OrchestratorMessage>>,
}

/// Accepts agent connections, authenticates them, acks reports and
/// chunks, and lets tests inject orchestrator frames.
#[derive(Clone)]
pub struct FakeOrchestrator {
    pub addr: String,
    state: Arc<Mutex<State>>,
}

impl FakeOrchestrator {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state: Arc<Mutex<State>> = Arc::default();
        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { return };
                let state = accept_state.clone();
                tokio::spawn(serve_agent(stream, state));
            }
        });
        Self { addr, state }
    }

    /// Push a frame to the currently connected agent.
    pub fn send(&self, msg: OrchestratorMessage) {
        let state = self.state.lock().unwrap();
        let outbox = state.outbox.as_ref().expect("no agent connected");
        outbox.send(msg).unwrap();
    }

    pub fn auths(&self) -> u32 {
        self.state.lock().unwrap().auths
    }

    pub fn reports(&self) -> Vec<ResultReport> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn artifact_bytes(&self, id: &ArtifactId) -> Vec<u8> {
        self.state.lock().unwrap().artifacts.get(id).cloned().unwrap_or_default()
    }

    pub fn acked_offsets(&self) -> Vec<u64> {
        self.state.lock().unwrap().acked_offsets.clone()
    }

    /// Ack `n` chunks, then drop the connection once without acking.
    pub fn drop_connection_after_chunks(&self, n: u32) {
        self.state.lock().unwrap().ack_before_drop = Some(n);
    }

    /// Poll until `n` successful authentications have happened.
    pub async fn wait_auths(&self, n: u32) {
        for _ in 0..500 {
            if self.auths() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("agent never authenticated {n} time(s)");
    }
}

async fn serve_agent(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    // Handshake: first frame must be Authenticate.
    let hello: AgentMessage = match read_message(&mut stream).await {
        Ok(msg) => msg,
        Err(_) => return,
    };
    match hello {
        AgentMessage::Authenticate { token, .. } if token == GOOD_TOKEN => {
            state.lock().unwrap().auths += 1;
            if write_message(&mut stream, &OrchestratorMessage::AuthAck).await.is_err() {
                return;
            }
        }
        AgentMessage::Authenticate { .. } => {
            let reject = OrchestratorMessage::AuthReject { reason: "unknown token".to_string() };
            let _ = write_message(&mut stream, &reject).await;
            return;
        }
        _ => return,
    }

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    state.lock().unwrap().outbox = Some(outbox_tx);

    let (mut reader, mut writer) = stream.into_split();
    loop {
        tokio::select! {
            incoming = read_message::<_, AgentMessage>(&mut reader) => {
                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(_) => return,
                };
                match msg {
                    AgentMessage::ResultReport { report } => {
                        let job_id = report.job_id.clone();
                        state.lock().unwrap().reports.push(report);
                        let ack = OrchestratorMessage::ReportAck { job_id };
                        if write_message(&mut writer, &ack).await.is_err() {
                            return;
                        }
                    }
                    AgentMessage::ArtifactChunk { artifact_id, offset, bytes, .. } => {
                        {
                            let mut state = state.lock().unwrap();
                            if let Some(limit) = state.ack_before_drop {
                                if !state.dropped && state.acked_offsets.len() as u32 >= limit {
                                    state.dropped = true;
                                    // Drop without acking; the agent must
                                    // resume from the last acked offset.
                                    return;
                                }
                            }
                            let buffer = state.artifacts.entry(artifact_id.clone()).or_default();
                            let end = offset as usize + bytes.len();
                            if buffer.len() < end {
                                buffer.resize(end, 0);
                            }
                            buffer[offset as usize..end].copy_from_slice(&bytes);
                            state.acked_offsets.push(offset);
                        }
                        let ack = OrchestratorMessage::ArtifactAck {
                            artifact_id,
                            offset: offset + bytes.len() as u64,
                        };
                        if write_message(&mut writer, &ack).await.is_err() {
                            return;
                        }
                    }
                    AgentMessage::Authenticate { .. } => {}
                }
            }
            out = outbox_rx.recv() => {
                let Some(msg) = out else { return };
                if write_message(&mut writer, &msg).await.is_err() {
                    return;
                }
            }
        }
    }
}
