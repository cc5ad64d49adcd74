//! Worker units.
//!
//! Each worker is a named OS thread running its own single-threaded tokio
//! runtime. The coordinator talks to it over an ordered command channel; the
//! worker answers on the shared report channel.
//!
//! The workload itself is opaque. Anything it spawns with `tokio::spawn`
//! during `start` lands on the worker's runtime, so per-session work stays on
//! that worker's thread.
//!
//! The shim guarantees the report contract regardless of workload behavior:
//! `active` only after a successful start, and at most one terminal report per
//! activation.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use poolproto::{ActivationId, SessionKey, StreamPayload, WorkerCommand, WorkerReport};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::PoolError;

/// The per-session streaming work a worker runs.
#[async_trait]
pub trait StreamWorkload: Send + Sync + 'static {
    /// Bring the session up. Returns the correlation id (e.g. a transport
    /// session id) to record against the session.
    ///
    /// `reporter` stays valid for the life of the activation and is how a
    /// running session reports that it died.
    async fn start(
        &self,
        key: &SessionKey,
        payload: &StreamPayload,
        reporter: SessionReporter,
    ) -> anyhow::Result<String>;

    /// Tear the session down. `payload` is the one it was started with.
    async fn stop(&self, key: &SessionKey, payload: &StreamPayload) -> anyhow::Result<()>;
}

#[derive(Debug)]
struct Fault {
    key: SessionKey,
    activation: ActivationId,
    reason: String,
}

/// Lets a running session report an asynchronous failure.
#[derive(Debug, Clone)]
pub struct SessionReporter {
    key: SessionKey,
    activation: ActivationId,
    tx: mpsc::UnboundedSender<Fault>,
}

impl SessionReporter {
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Report that the session failed. Ignored if the activation already
    /// ended.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Fault {
            key: self.key.clone(),
            activation: self.activation,
            reason: reason.into(),
        });
    }
}

struct LiveSession {
    activation: ActivationId,
    payload: StreamPayload,
}

/// A running worker thread.
pub struct WorkerUnit {
    index: usize,
    thread: Option<JoinHandle<()>>,
}

impl WorkerUnit {
    /// Spawn worker `index`. Returns the unit and its command link.
    pub fn spawn(
        index: usize,
        workload: Arc<dyn StreamWorkload>,
        reports: mpsc::UnboundedSender<WorkerReport>,
    ) -> Result<(Self, mpsc::UnboundedSender<WorkerCommand>), PoolError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name(format!("stream-worker-{index}"))
            .build()
            .map_err(PoolError::Runtime)?;

        let thread = thread::Builder::new()
            .name(format!("stream-worker-{index}"))
            .spawn(move || {
                runtime.block_on(worker_loop(index, cmd_rx, reports, workload));
            })
            .map_err(|source| PoolError::WorkerSpawn { index, source })?;

        info!(worker.index = index, "worker started");

        Ok((
            Self {
                index,
                thread: Some(thread),
            },
            cmd_tx,
        ))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Wait for the thread to exit. Its command link must be closed first.
    pub fn join(mut self) -> Result<(), PoolError> {
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| PoolError::Join { index: self.index }),
            None => Ok(()),
        }
    }
}

async fn worker_loop(
    index: usize,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    reports: mpsc::UnboundedSender<WorkerReport>,
    workload: Arc<dyn StreamWorkload>,
) {
    let (fault_tx, mut fault_rx) = mpsc::unbounded_channel::<Fault>();
    let mut live: HashMap<SessionKey, LiveSession> = HashMap::new();

    debug!(worker.index = index, "worker loop started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                let report = match cmd {
                    WorkerCommand::Start { session_key, activation, payload } => {
                        let reporter = SessionReporter {
                            key: session_key.clone(),
                            activation,
                            tx: fault_tx.clone(),
                        };
                        match workload.start(&session_key, &payload, reporter).await {
                            Ok(correlation) => {
                                info!(
                                    worker.index = index,
                                    session.key = %session_key,
                                    %activation,
                                    %correlation,
                                    "session active"
                                );
                                live.insert(session_key.clone(), LiveSession { activation, payload });
                                Some(WorkerReport::active(session_key, activation, correlation))
                            }
                            Err(e) => {
                                warn!(
                                    worker.index = index,
                                    session.key = %session_key,
                                    %activation,
                                    error = %e,
                                    "session failed to start"
                                );
                                Some(WorkerReport::failed(session_key, activation, format!("{e:#}")))
                            }
                        }
                    }
                    WorkerCommand::Stop { session_key, activation, payload } => {
                        let is_live = live
                            .get(&session_key)
                            .is_some_and(|s| s.activation == activation);
                        if is_live {
                            live.remove(&session_key);
                            match workload.stop(&session_key, &payload).await {
                                Ok(()) => {
                                    info!(worker.index = index, session.key = %session_key, "session stopped");
                                    Some(WorkerReport::inactive(session_key, activation))
                                }
                                Err(e) => {
                                    warn!(
                                        worker.index = index,
                                        session.key = %session_key,
                                        error = %e,
                                        "session failed while stopping"
                                    );
                                    Some(WorkerReport::failed(session_key, activation, format!("{e:#}")))
                                }
                            }
                        } else {
                            // Already ended (start failed or the session faulted)
                            debug!(
                                worker.index = index,
                                session.key = %session_key,
                                %activation,
                                "ignoring stop for session that is not live"
                            );
                            None
                        }
                    }
                };

                if let Some(report) = report {
                    if reports.send(report).is_err() {
                        debug!(worker.index = index, "report channel closed");
                    }
                }
            }

            Some(fault) = fault_rx.recv() => {
                let is_live = live
                    .get(&fault.key)
                    .is_some_and(|s| s.activation == fault.activation);
                if !is_live {
                    debug!(
                        worker.index = index,
                        session.key = %fault.key,
                        activation = %fault.activation,
                        "ignoring fault for session that is not live"
                    );
                    continue;
                }

                live.remove(&fault.key);
                error!(
                    worker.index = index,
                    session.key = %fault.key,
                    reason = %fault.reason,
                    "session faulted"
                );
                let report = WorkerReport::failed(fault.key, fault.activation, fault.reason);
                if reports.send(report).is_err() {
                    debug!(worker.index = index, "report channel closed");
                }
            }
        }
    }

    if !live.is_empty() {
        info!(worker.index = index, sessions = live.len(), "stopping live sessions on shutdown");
    }
    for (key, session) in live.drain() {
        if let Err(e) = workload.stop(&key, &session.payload).await {
            warn!(worker.index = index, session.key = %key, error = %e, "stop failed during shutdown");
        }
    }

    debug!(worker.index = index, "worker loop exiting");
}
