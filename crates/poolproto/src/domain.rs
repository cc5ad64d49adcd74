//! Identity and state types shared across the pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// SessionKey - caller-assigned session identity
// ============================================================================

/// Identifies one stream session (typically a device identity).
///
/// Unique across the whole pool at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// ActivationId - one accepted start of a session key
// ============================================================================

/// Distinguishes successive activations of the same session key.
///
/// Assigned by the coordinator when a start is accepted and echoed back on
/// every worker report, so reports from an earlier activation can be told
/// apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationId(pub u64);

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state reported by workers and relayed to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Inactive,
    Failed,
}

impl SessionState {
    /// Inactive and failed end a session's registered lifetime.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Inactive | SessionState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Inactive => "inactive",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown session state: {0}")]
pub struct ParseStateError(String);

impl FromStr for SessionState {
    type Err = ParseStateError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionState::Active),
            "inactive" => Ok(SessionState::Inactive),
            "failed" => Ok(SessionState::Failed),
            _ => Err(ParseStateError(s.to_string())),
        }
    }
}

// ============================================================================
// StreamPayload - opaque stream parameters
// ============================================================================

/// Stream parameters handed through to the workload untouched.
///
/// The coordinator never interprets these; workloads read what they need
/// with the typed accessors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamPayload(serde_json::Value);

impl StreamPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn u64_param(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(|v| v.as_u64())
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }
}

impl From<serde_json::Value> for StreamPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
