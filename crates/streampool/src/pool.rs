//! Pool assembly: spawns workers and the coordinator, hands out handles.

use std::sync::Arc;

use futures::Stream;
use poolconf::PoolConfig;
use poolproto::{ControlRequest, SessionEvent, SessionKey, StreamPayload};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{ControlMessage, PoolCoordinator, PoolSnapshot};
use crate::error::PoolError;
use crate::events::EventBus;
use crate::sizing::{detected_parallelism, pool_size};
use crate::worker::{StreamWorkload, WorkerUnit};

/// Cheap, cloneable access to a running pool.
#[derive(Clone)]
pub struct PoolHandle {
    control: mpsc::Sender<ControlMessage>,
    events: EventBus,
}

impl PoolHandle {
    /// Ask for a session to start. The outcome arrives as an event.
    pub async fn start_session(
        &self,
        key: impl Into<SessionKey>,
        label: impl Into<String>,
        payload: StreamPayload,
    ) -> Result<(), PoolError> {
        self.send(ControlMessage::Request(ControlRequest::StartSession {
            session_key: key.into(),
            label: label.into(),
            payload,
        }))
        .await
    }

    /// Ask for a session to stop. The outcome arrives as an event.
    pub async fn stop_session(&self, key: impl Into<SessionKey>) -> Result<(), PoolError> {
        self.send(ControlMessage::Request(ControlRequest::StopSession {
            session_key: key.into(),
        }))
        .await
    }

    /// Submit any control request. `pool_status` is answered with a snapshot.
    pub async fn request(&self, request: ControlRequest) -> Result<Option<PoolSnapshot>, PoolError> {
        match request {
            ControlRequest::PoolStatus => self.snapshot().await.map(Some),
            other => self.send(ControlMessage::Request(other)).await.map(|_| None),
        }
    }

    pub async fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlMessage::Snapshot(tx)).await?;
        rx.await.map_err(|_| PoolError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Events for one session key only.
    pub fn watch(&self, key: impl Into<SessionKey>) -> impl Stream<Item = SessionEvent> + Send + 'static {
        self.events.watch(key.into())
    }

    async fn send(&self, msg: ControlMessage) -> Result<(), PoolError> {
        self.control.send(msg).await.map_err(|_| PoolError::Closed)
    }
}

/// A fixed set of workers plus the coordinator task that schedules onto them.
pub struct StreamPool {
    handle: PoolHandle,
    workers: Vec<WorkerUnit>,
    coordinator: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl StreamPool {
    /// Size the pool from host parallelism and the configured cap, then
    /// spawn it. Must be called from within a tokio runtime.
    pub fn spawn(config: &PoolConfig, workload: Arc<dyn StreamWorkload>) -> Result<Self, PoolError> {
        let cores = detected_parallelism();
        let size = pool_size(cores, config.pool.max_workers);
        info!(cores, max_workers = config.pool.max_workers, size, "sizing worker pool");
        Self::spawn_sized(size, config, workload)
    }

    /// Spawn exactly `size` workers (at least one).
    pub fn spawn_sized(
        size: usize,
        config: &PoolConfig,
        workload: Arc<dyn StreamWorkload>,
    ) -> Result<Self, PoolError> {
        let size = size.max(1);
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(size);
        let mut links = Vec::with_capacity(size);
        for index in 0..size {
            let (unit, link) = WorkerUnit::spawn(index, Arc::clone(&workload), report_tx.clone())?;
            workers.push(unit);
            links.push(link);
        }
        // Workers hold the only report senders now
        drop(report_tx);

        let events = EventBus::new(config.events.capacity);
        let (control_tx, control_rx) = mpsc::channel(config.events.control_buffer.max(1));
        let shutdown = CancellationToken::new();

        let coordinator = PoolCoordinator::new(links, events.clone(), config.stop_timeout());
        let task = tokio::spawn(coordinator.run(
            control_rx,
            report_rx,
            config.sweep_interval(),
            shutdown.clone(),
        ));

        Ok(Self {
            handle: PoolHandle {
                control: control_tx,
                events,
            },
            workers,
            coordinator: task,
            shutdown,
        })
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop the coordinator, then let every worker tear down its live
    /// sessions and exit.
    pub async fn shutdown(self) -> Result<(), PoolError> {
        self.shutdown.cancel();
        // The coordinator owns the worker links; its exit closes them
        if let Err(e) = self.coordinator.await {
            warn!(error = %e, "coordinator task ended abnormally");
        }

        let workers = self.workers;
        let results = tokio::task::spawn_blocking(move || {
            workers
                .into_iter()
                .map(|unit| {
                    let index = unit.index();
                    let result = unit.join();
                    debug!(worker.index = index, ok = result.is_ok(), "worker joined");
                    result
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|_| PoolError::Closed)?;

        for result in results {
            result?;
        }
        info!("worker pool shut down");
        Ok(())
    }
}
