//! Pool coordinator.
//!
//! Owns every session registry and is the only writer to them. All
//! control-plane events (start, stop, worker reports, deadline sweeps) are
//! processed one at a time by a single task, which is what keeps a session
//! key on at most one worker under concurrent bursts.
//!
//! Start and stop are fire-and-forget: the coordinator never waits on a
//! worker. Outcomes come back as reports and are relayed on the event bus.

use std::time::{Duration, Instant};

use poolproto::{
    ActivationId, ControlRequest, SessionEvent, SessionKey, SessionState, StreamPayload,
    WorkerCommand, WorkerReport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::EventBus;
use crate::registry::{SessionRecord, SessionRegistry};

/// Detail attached to the synthetic failure emitted when a stop goes unanswered.
pub const STOP_TIMEOUT_DETAIL: &str = "stop timed out";

/// A worker's command link and the sessions assigned to it.
pub struct WorkerEntry {
    link: mpsc::UnboundedSender<WorkerCommand>,
    sessions: SessionRegistry,
}

impl WorkerEntry {
    pub fn new(link: mpsc::UnboundedSender<WorkerCommand>) -> Self {
        Self {
            link,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn load(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

/// What a start request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Assigned {
        worker: usize,
        activation: ActivationId,
    },
    /// The key was already registered; nothing was dispatched.
    AlreadyRegistered { worker: usize },
    /// The chosen worker's link was closed; the session was failed.
    WorkerUnavailable { worker: usize },
}

/// What a stop request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Forwarded { worker: usize },
    /// Nothing was registered; a synthetic `inactive` was published.
    NotRegistered,
    WorkerUnavailable { worker: usize },
}

/// Messages from pool handles to the coordinator task.
#[derive(Debug)]
pub enum ControlMessage {
    Request(ControlRequest),
    Snapshot(oneshot::Sender<PoolSnapshot>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub key: SessionKey,
    pub label: String,
    pub activation: ActivationId,
    pub correlation: Option<String>,
    pub stopping: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub index: usize,
    pub load: usize,
    pub sessions: Vec<SessionSummary>,
}

/// Point-in-time view of worker loads and their sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub workers: Vec<WorkerSnapshot>,
}

impl PoolSnapshot {
    pub fn loads(&self) -> Vec<usize> {
        self.workers.iter().map(|w| w.load).collect()
    }

    pub fn total_sessions(&self) -> usize {
        self.workers.iter().map(|w| w.load).sum()
    }
}

pub struct PoolCoordinator {
    workers: Vec<WorkerEntry>,
    events: EventBus,
    next_activation: u64,
    stop_timeout: Option<Duration>,
}

impl PoolCoordinator {
    /// One entry per worker link, in pool order. Registries start empty.
    pub fn new(
        links: Vec<mpsc::UnboundedSender<WorkerCommand>>,
        events: EventBus,
        stop_timeout: Option<Duration>,
    ) -> Self {
        Self {
            workers: links.into_iter().map(WorkerEntry::new).collect(),
            events,
            next_activation: 1,
            stop_timeout,
        }
    }

    pub fn workers(&self) -> &[WorkerEntry] {
        &self.workers
    }

    pub fn loads(&self) -> Vec<usize> {
        self.workers.iter().map(WorkerEntry::load).collect()
    }

    /// Index of the worker holding `key`. Keys are unique pool-wide, so the
    /// first match is the only match.
    pub fn locate(&self, key: &SessionKey) -> Option<usize> {
        self.workers.iter().position(|w| w.sessions.contains(key))
    }

    /// Lowest load wins; ties go to the lowest index.
    fn least_loaded(&self) -> usize {
        self.workers
            .iter()
            .enumerate()
            .min_by_key(|(index, w)| (w.load(), *index))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    pub fn apply(&mut self, request: ControlRequest) -> Option<PoolSnapshot> {
        match request {
            ControlRequest::StartSession {
                session_key,
                label,
                payload,
            } => {
                self.start_session(session_key, label, payload);
                None
            }
            ControlRequest::StopSession { session_key } => {
                self.stop_session(&session_key);
                None
            }
            ControlRequest::PoolStatus => Some(self.snapshot()),
        }
    }

    pub fn start_session(
        &mut self,
        key: SessionKey,
        label: String,
        payload: StreamPayload,
    ) -> Placement {
        if let Some(worker) = self.locate(&key) {
            debug!(session.key = %key, worker.index = worker, "start ignored, session already registered");
            return Placement::AlreadyRegistered { worker };
        }

        let worker = self.least_loaded();
        let activation = ActivationId(self.next_activation);
        self.next_activation += 1;

        // Register before dispatch so the next request sees the new load
        let entry = &mut self.workers[worker];
        entry.sessions.insert(SessionRecord::new(
            key.clone(),
            label.clone(),
            payload.clone(),
            activation,
        ));

        let command = WorkerCommand::Start {
            session_key: key.clone(),
            activation,
            payload,
        };
        if entry.link.send(command).is_err() {
            warn!(session.key = %key, worker.index = worker, "worker link closed, failing session");
            entry.sessions.remove(&key);
            self.events.publish(SessionEvent::failed(
                key,
                Some(format!("worker {worker} is not running")),
            ));
            return Placement::WorkerUnavailable { worker };
        }

        info!(
            session.key = %key,
            session.label = %label,
            worker.index = worker,
            worker.load = entry.load(),
            %activation,
            "session assigned"
        );
        Placement::Assigned { worker, activation }
    }

    pub fn stop_session(&mut self, key: &SessionKey) -> StopOutcome {
        let Some(worker) = self.locate(key) else {
            debug!(session.key = %key, "stop for unregistered session, reporting inactive");
            self.events.publish(SessionEvent::inactive(key.clone()));
            return StopOutcome::NotRegistered;
        };

        let entry = &mut self.workers[worker];
        let Some(record) = entry.sessions.get_mut(key) else {
            return StopOutcome::NotRegistered;
        };

        // The record stays until the worker reports a terminal state
        record.stop_requested_at.get_or_insert_with(Instant::now);
        let command = WorkerCommand::Stop {
            session_key: key.clone(),
            activation: record.activation,
            payload: record.payload.clone(),
        };

        if entry.link.send(command).is_err() {
            warn!(session.key = %key, worker.index = worker, "worker link closed, failing session");
            entry.sessions.remove(key);
            self.events.publish(SessionEvent::failed(
                key.clone(),
                Some(format!("worker {worker} is not running")),
            ));
            return StopOutcome::WorkerUnavailable { worker };
        }

        info!(session.key = %key, worker.index = worker, "stop forwarded");
        StopOutcome::Forwarded { worker }
    }

    /// Apply a worker report. Reports for unknown keys or earlier
    /// activations are dropped.
    pub fn handle_report(&mut self, report: WorkerReport) {
        let Some(worker) = self.locate(&report.session_key) else {
            debug!(
                session.key = %report.session_key,
                session.state = %report.state,
                "dropping report for unregistered session"
            );
            return;
        };

        let entry = &mut self.workers[worker];
        let Some(record) = entry.sessions.get_mut(&report.session_key) else {
            return;
        };
        if record.activation != report.activation {
            debug!(
                session.key = %report.session_key,
                session.state = %report.state,
                report.activation = %report.activation,
                current.activation = %record.activation,
                "dropping report from an earlier activation"
            );
            return;
        }

        match report.state {
            SessionState::Active => {
                record.correlation = report.correlation.clone();
                info!(
                    session.key = %report.session_key,
                    worker.index = worker,
                    correlation = ?report.correlation,
                    "session active"
                );
                self.events
                    .publish(SessionEvent::active(report.session_key, report.correlation));
            }
            SessionState::Inactive | SessionState::Failed => {
                let key = report.session_key.clone();
                if report.state == SessionState::Failed {
                    warn!(
                        session.key = %key,
                        worker.index = worker,
                        detail = ?report.detail,
                        "session failed"
                    );
                } else {
                    info!(session.key = %key, worker.index = worker, "session inactive");
                }
                self.events.publish(SessionEvent::from(report));
                entry.sessions.remove(&key);
            }
        }
    }

    /// Fail sessions whose stop has gone unanswered past the deadline.
    /// Returns the keys that were expired.
    pub fn expire_stops(&mut self, now: Instant) -> Vec<SessionKey> {
        let Some(timeout) = self.stop_timeout else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for (index, entry) in self.workers.iter_mut().enumerate() {
            for key in entry.sessions.stops_outstanding(now, timeout) {
                entry.sessions.remove(&key);
                warn!(
                    session.key = %key,
                    worker.index = index,
                    timeout_ms = timeout.as_millis() as u64,
                    "stop unanswered, forcing session out"
                );
                self.events.publish(SessionEvent::failed(
                    key.clone(),
                    Some(STOP_TIMEOUT_DETAIL.to_string()),
                ));
                expired.push(key);
            }
        }
        expired
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let workers = self
            .workers
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut sessions: Vec<SessionSummary> = entry
                    .sessions
                    .records()
                    .map(|r| SessionSummary {
                        key: r.key.clone(),
                        label: r.label.clone(),
                        activation: r.activation,
                        correlation: r.correlation.clone(),
                        stopping: r.is_stopping(),
                    })
                    .collect();
                sessions.sort_by(|a, b| a.key.cmp(&b.key));
                WorkerSnapshot {
                    index,
                    load: entry.load(),
                    sessions,
                }
            })
            .collect();
        PoolSnapshot { workers }
    }

    /// Process control messages and worker reports until shutdown or until
    /// every handle is gone.
    ///
    /// Reports are drained ahead of new requests so terminal states free
    /// their slots before the next placement.
    pub async fn run(
        mut self,
        mut control_rx: mpsc::Receiver<ControlMessage>,
        mut report_rx: mpsc::UnboundedReceiver<WorkerReport>,
        sweep_interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut sweep = tokio::time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(workers = self.workers.len(), "coordinator started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("coordinator shutting down");
                    break;
                }

                Some(report) = report_rx.recv() => {
                    self.handle_report(report);
                }

                msg = control_rx.recv() => {
                    match msg {
                        Some(ControlMessage::Request(request)) => {
                            self.apply(request);
                        }
                        Some(ControlMessage::Snapshot(reply)) => {
                            let _ = reply.send(self.snapshot());
                        }
                        None => {
                            info!("control channel closed, coordinator exiting");
                            break;
                        }
                    }
                }

                _ = sweep.tick(), if self.stop_timeout.is_some() => {
                    self.expire_stops(Instant::now());
                }
            }
        }

        let remaining: usize = self.loads().iter().sum();
        if remaining > 0 {
            info!(sessions = remaining, "coordinator exiting with registered sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast;

    struct Harness {
        coordinator: PoolCoordinator,
        worker_rx: Vec<mpsc::UnboundedReceiver<WorkerCommand>>,
        events: broadcast::Receiver<SessionEvent>,
    }

    impl Harness {
        fn new(size: usize) -> Self {
            Self::with_timeout(size, None)
        }

        fn with_timeout(size: usize, stop_timeout: Option<Duration>) -> Self {
            let (links, worker_rx): (Vec<_>, Vec<_>) =
                (0..size).map(|_| mpsc::unbounded_channel()).unzip();
            let bus = EventBus::new(64);
            let events = bus.subscribe();
            Self {
                coordinator: PoolCoordinator::new(links, bus, stop_timeout),
                worker_rx,
                events,
            }
        }

        fn start(&mut self, key: &str) -> Placement {
            self.coordinator.start_session(
                SessionKey::from(key),
                format!("{key} label"),
                StreamPayload::new(json!({ "device": key })),
            )
        }

        fn stop(&mut self, key: &str) -> StopOutcome {
            self.coordinator.stop_session(&SessionKey::from(key))
        }

        fn command(&mut self, worker: usize) -> Option<WorkerCommand> {
            self.worker_rx[worker].try_recv().ok()
        }

        fn event(&mut self) -> Option<SessionEvent> {
            self.events.try_recv().ok()
        }

        fn activation_of(&self, key: &str) -> ActivationId {
            let key = SessionKey::from(key);
            let worker = self.coordinator.locate(&key).expect("session not registered");
            self.coordinator.workers()[worker]
                .sessions()
                .get(&key)
                .unwrap()
                .activation
        }

        fn report(&mut self, report: WorkerReport) {
            self.coordinator.handle_report(report);
        }

        fn active(&mut self, key: &str, correlation: &str) {
            let activation = self.activation_of(key);
            self.report(WorkerReport::active(SessionKey::from(key), activation, correlation));
        }

        fn inactive(&mut self, key: &str) {
            let activation = self.activation_of(key);
            self.report(WorkerReport::inactive(SessionKey::from(key), activation));
        }

        fn failed(&mut self, key: &str, detail: &str) {
            let activation = self.activation_of(key);
            self.report(WorkerReport::failed(SessionKey::from(key), activation, detail));
        }

        fn registrations(&self, key: &str) -> usize {
            let key = SessionKey::from(key);
            self.coordinator
                .workers()
                .iter()
                .filter(|w| w.sessions().contains(&key))
                .count()
        }
    }

    fn assigned_worker(placement: Placement) -> usize {
        match placement {
            Placement::Assigned { worker, .. } => worker,
            other => panic!("Expected Assigned, got {:?}", other),
        }
    }

    #[test]
    fn test_concrete_scenario() {
        let mut h = Harness::new(2);

        assert_eq!(assigned_worker(h.start("A")), 0);
        assert_eq!(assigned_worker(h.start("B")), 1);
        assert_eq!(h.coordinator.loads(), vec![1, 1]);

        assert_eq!(h.stop("A"), StopOutcome::Forwarded { worker: 0 });

        // Start then stop reached worker 0, with A's stored payload on the stop
        assert!(matches!(h.command(0), Some(WorkerCommand::Start { .. })));
        match h.command(0) {
            Some(WorkerCommand::Stop { session_key, payload, .. }) => {
                assert_eq!(session_key.as_str(), "A");
                assert_eq!(payload.str_param("device"), Some("A"));
            }
            other => panic!("Expected Stop, got {:?}", other),
        }

        // Still registered until the worker answers
        assert_eq!(h.registrations("A"), 1);
        h.inactive("A");
        assert_eq!(h.registrations("A"), 0);
        assert_eq!(h.coordinator.loads(), vec![0, 1]);

        assert_eq!(assigned_worker(h.start("C")), 0);
    }

    #[test]
    fn test_least_loaded_with_lowest_index_tiebreak() {
        let mut h = Harness::new(3);

        let placed: Vec<usize> = ["s1", "s2", "s3", "s4", "s5", "s6", "s7"]
            .iter()
            .map(|k| assigned_worker(h.start(k)))
            .collect();
        assert_eq!(placed, vec![0, 1, 2, 0, 1, 2, 0]);

        // Free two slots on worker 1 and one on worker 2
        h.inactive("s2");
        h.inactive("s5");
        h.failed("s3", "gone");
        assert_eq!(h.coordinator.loads(), vec![3, 0, 1]);

        assert_eq!(assigned_worker(h.start("s8")), 1);
        assert_eq!(assigned_worker(h.start("s9")), 1);
        // 3, 2, 1 -> worker 2
        assert_eq!(assigned_worker(h.start("s10")), 2);
        // 3, 2, 2 -> tie between 1 and 2 goes to 1
        assert_eq!(assigned_worker(h.start("s11")), 1);
    }

    #[test]
    fn test_every_placement_targets_a_minimum_load_worker() {
        let mut h = Harness::new(4);
        for i in 0..25 {
            let before = h.coordinator.loads();
            let min = *before.iter().min().unwrap();
            let worker = assigned_worker(h.start(&format!("k{i}")));
            assert_eq!(before[worker], min);
            assert!(before[..worker].iter().all(|&l| l > min));

            // Knock out some sessions along the way
            if i % 3 == 2 {
                h.inactive(&format!("k{}", i - 1));
            }
        }
    }

    #[test]
    fn test_duplicate_start_is_noop() {
        let mut h = Harness::new(2);

        let first = h.start("cam");
        let worker = assigned_worker(first);
        assert_eq!(h.start("cam"), Placement::AlreadyRegistered { worker });

        assert_eq!(h.registrations("cam"), 1);
        assert!(matches!(h.command(worker), Some(WorkerCommand::Start { .. })));
        assert!(h.command(worker).is_none());
        assert!(h.command(1 - worker).is_none());
        assert!(h.event().is_none());
    }

    #[test]
    fn test_duplicate_start_after_active_is_noop() {
        let mut h = Harness::new(2);
        h.start("cam");
        h.active("cam", "rtp-1");
        assert!(matches!(
            h.start("cam"),
            Placement::AlreadyRegistered { worker: 0 }
        ));
        assert_eq!(h.coordinator.loads(), vec![1, 0]);
    }

    #[test]
    fn test_stop_unknown_session_reports_inactive() {
        let mut h = Harness::new(2);
        h.start("other");
        let loads = h.coordinator.loads();

        assert_eq!(h.stop("ghost"), StopOutcome::NotRegistered);

        let event = h.event().expect("synthetic event");
        assert_eq!(event, SessionEvent::inactive(SessionKey::from("ghost")));
        assert_eq!(h.coordinator.loads(), loads);
        // Only the start for "other" was ever dispatched
        assert!(matches!(h.command(0), Some(WorkerCommand::Start { .. })));
        assert!(h.command(0).is_none());
    }

    #[test]
    fn test_lifecycle_round_trip() {
        let mut h = Harness::new(2);
        h.start("cam");

        h.active("cam", "rtp-42");
        let event = h.event().unwrap();
        assert_eq!(event.state, SessionState::Active);
        assert_eq!(event.correlation.as_deref(), Some("rtp-42"));

        let worker = h.coordinator.locate(&SessionKey::from("cam")).unwrap();
        let record = h.coordinator.workers()[worker]
            .sessions()
            .get(&SessionKey::from("cam"))
            .unwrap();
        assert_eq!(record.correlation.as_deref(), Some("rtp-42"));

        h.stop("cam");
        h.inactive("cam");
        let event = h.event().unwrap();
        assert_eq!(event.state, SessionState::Inactive);
        assert_eq!(h.registrations("cam"), 0);
    }

    #[test]
    fn test_failure_scenario() {
        let mut h = Harness::new(2);
        h.start("X");
        assert_eq!(assigned_worker(h.start("D")), 1);
        h.active("D", "rtp-d");
        assert_eq!(h.event().unwrap().state, SessionState::Active);

        h.failed("D", "decrypt error");
        let event = h.event().unwrap();
        assert_eq!(event.state, SessionState::Failed);
        assert_eq!(event.detail.as_deref(), Some("decrypt error"));
        assert!(h.event().is_none());
        assert_eq!(h.registrations("D"), 0);

        assert_eq!(h.stop("D"), StopOutcome::NotRegistered);
        assert_eq!(h.event().unwrap().state, SessionState::Inactive);
    }

    #[test]
    fn test_stale_reports_are_dropped() {
        let mut h = Harness::new(1);

        // Unknown key
        h.report(WorkerReport::inactive(SessionKey::from("ghost"), ActivationId(9)));
        assert!(h.event().is_none());

        // Earlier activation of a key that has since restarted
        h.start("cam");
        let first = h.activation_of("cam");
        h.inactive("cam");
        h.event();
        h.start("cam");

        h.report(WorkerReport::failed(SessionKey::from("cam"), first, "late"));
        assert!(h.event().is_none());
        assert_eq!(h.registrations("cam"), 1);
    }

    #[test]
    fn test_duplicate_terminal_report_emits_once() {
        let mut h = Harness::new(1);
        h.start("cam");
        let activation = h.activation_of("cam");

        h.report(WorkerReport::inactive(SessionKey::from("cam"), activation));
        h.report(WorkerReport::inactive(SessionKey::from("cam"), activation));

        assert!(h.event().is_some());
        assert!(h.event().is_none());
    }

    #[test]
    fn test_closed_worker_link_fails_session() {
        let mut h = Harness::new(2);
        h.worker_rx.remove(0);

        assert_eq!(h.start("cam"), Placement::WorkerUnavailable { worker: 0 });
        let event = h.event().unwrap();
        assert_eq!(event.state, SessionState::Failed);
        assert_eq!(h.registrations("cam"), 0);
    }

    #[test]
    fn test_stop_timeout_forces_failure() {
        let timeout = Duration::from_secs(5);
        let mut h = Harness::with_timeout(1, Some(timeout));
        h.start("slow");
        h.start("fine");
        h.stop("slow");

        let now = Instant::now();
        assert!(h.coordinator.expire_stops(now).is_empty());

        let expired = h.coordinator.expire_stops(now + timeout + Duration::from_millis(1));
        assert_eq!(expired, vec![SessionKey::from("slow")]);
        assert_eq!(h.registrations("slow"), 0);
        assert_eq!(h.registrations("fine"), 1);

        let event = h.event().unwrap();
        assert_eq!(event.state, SessionState::Failed);
        assert_eq!(event.detail.as_deref(), Some(STOP_TIMEOUT_DETAIL));
    }

    #[test]
    fn test_stop_timeout_longer_than_clock_age() {
        let timeout = Duration::from_secs(200 * 365 * 24 * 3600);
        let mut h = Harness::with_timeout(1, Some(timeout));
        h.start("slow");
        h.stop("slow");

        let expired = h.coordinator.expire_stops(Instant::now() + timeout);
        assert_eq!(expired, vec![SessionKey::from("slow")]);
        assert_eq!(h.registrations("slow"), 0);
    }

    #[test]
    fn test_stop_timeout_disabled() {
        let mut h = Harness::new(1);
        h.start("slow");
        h.stop("slow");
        let later = Instant::now() + Duration::from_secs(3600);
        assert!(h.coordinator.expire_stops(later).is_empty());
        assert_eq!(h.registrations("slow"), 1);
    }

    #[test]
    fn test_repeated_stop_keeps_first_deadline() {
        let mut h = Harness::with_timeout(1, Some(Duration::from_secs(5)));
        h.start("cam");
        h.stop("cam");
        let first = h.coordinator.workers()[0]
            .sessions()
            .get(&SessionKey::from("cam"))
            .unwrap()
            .stop_requested_at;

        h.stop("cam");
        let second = h.coordinator.workers()[0]
            .sessions()
            .get(&SessionKey::from("cam"))
            .unwrap()
            .stop_requested_at;
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot() {
        let mut h = Harness::new(2);
        h.start("b");
        h.start("a");
        h.start("c");
        h.active("c", "rtp-c");
        h.stop("a");

        let snapshot = h.coordinator.apply(ControlRequest::PoolStatus).unwrap();
        assert_eq!(snapshot.loads(), vec![2, 1]);
        assert_eq!(snapshot.total_sessions(), 3);

        let w0: Vec<&str> = snapshot.workers[0].sessions.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(w0, vec!["b", "c"]);
        assert_eq!(snapshot.workers[0].sessions[1].correlation.as_deref(), Some("rtp-c"));
        assert!(snapshot.workers[1].sessions[0].stopping);
    }

    #[tokio::test]
    async fn test_run_loop_processes_requests_and_reports() {
        let (link, mut worker_rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let coordinator = PoolCoordinator::new(vec![link], bus, None);

        let (control_tx, control_rx) = mpsc::channel(16);
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(coordinator.run(
            control_rx,
            report_rx,
            Duration::from_millis(50),
            shutdown.clone(),
        ));

        control_tx
            .send(ControlMessage::Request(ControlRequest::StartSession {
                session_key: SessionKey::from("cam"),
                label: "Cam".to_string(),
                payload: StreamPayload::default(),
            }))
            .await
            .unwrap();

        let activation = match worker_rx.recv().await.unwrap() {
            WorkerCommand::Start { activation, .. } => activation,
            other => panic!("Expected Start, got {:?}", other),
        };
        report_tx
            .send(WorkerReport::active(SessionKey::from("cam"), activation, "rtp-1"))
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.state, SessionState::Active);

        let (reply_tx, reply_rx) = oneshot::channel();
        control_tx.send(ControlMessage::Snapshot(reply_tx)).await.unwrap();
        assert_eq!(reply_rx.await.unwrap().loads(), vec![1]);

        shutdown.cancel();
        task.await.unwrap();
    }
}
