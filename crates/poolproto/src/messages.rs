//! Envelopes exchanged between callers, the coordinator, and workers.

use serde::{Deserialize, Serialize};

use crate::domain::{ActivationId, SessionKey, SessionState, StreamPayload};

/// Requests accepted from external callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Begin a session. A no-op if the key is already registered.
    StartSession {
        session_key: SessionKey,
        #[serde(default)]
        label: String,
        #[serde(default)]
        payload: StreamPayload,
    },

    /// End a session. Answered with `inactive` right away if nothing is running.
    StopSession { session_key: SessionKey },

    /// Describe worker loads and registered sessions.
    PoolStatus,
}

/// Coordinator to worker. Delivered in order per worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    Start {
        session_key: SessionKey,
        activation: ActivationId,
        payload: StreamPayload,
    },
    Stop {
        session_key: SessionKey,
        activation: ActivationId,
        payload: StreamPayload,
    },
}

impl WorkerCommand {
    pub fn session_key(&self) -> &SessionKey {
        match self {
            WorkerCommand::Start { session_key, .. } | WorkerCommand::Stop { session_key, .. } => {
                session_key
            }
        }
    }

    pub fn activation(&self) -> ActivationId {
        match self {
            WorkerCommand::Start { activation, .. } | WorkerCommand::Stop { activation, .. } => {
                *activation
            }
        }
    }
}

/// Worker to coordinator status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub session_key: SessionKey,
    pub activation: ActivationId,
    pub state: SessionState,
    /// Transport-level session id, supplied with `active`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    /// Human-readable reason, usually supplied with `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WorkerReport {
    pub fn active(
        session_key: SessionKey,
        activation: ActivationId,
        correlation: impl Into<String>,
    ) -> Self {
        Self {
            session_key,
            activation,
            state: SessionState::Active,
            correlation: Some(correlation.into()),
            detail: None,
        }
    }

    pub fn inactive(session_key: SessionKey, activation: ActivationId) -> Self {
        Self {
            session_key,
            activation,
            state: SessionState::Inactive,
            correlation: None,
            detail: None,
        }
    }

    pub fn failed(
        session_key: SessionKey,
        activation: ActivationId,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            session_key,
            activation,
            state: SessionState::Failed,
            correlation: None,
            detail: Some(detail.into()),
        }
    }
}

/// A status transition published to listeners, one per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_key: SessionKey,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SessionEvent {
    pub fn active(session_key: SessionKey, correlation: Option<String>) -> Self {
        Self {
            session_key,
            state: SessionState::Active,
            correlation,
            detail: None,
        }
    }

    pub fn inactive(session_key: SessionKey) -> Self {
        Self {
            session_key,
            state: SessionState::Inactive,
            correlation: None,
            detail: None,
        }
    }

    pub fn failed(session_key: SessionKey, detail: Option<String>) -> Self {
        Self {
            session_key,
            state: SessionState::Failed,
            correlation: None,
            detail,
        }
    }
}

impl From<WorkerReport> for SessionEvent {
    fn from(report: WorkerReport) -> Self {
        Self {
            session_key: report.session_key,
            state: report.state,
            correlation: report.correlation,
            detail: report.detail,
        }
    }
}
