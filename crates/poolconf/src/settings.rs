//! Configuration sections.

use serde::{Deserialize, Serialize};

/// Worker pool sizing and session teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSection {
    /// Upper bound on worker count, applied after deriving from host cores.
    /// Default: 4
    #[serde(default = "PoolSection::default_max_workers")]
    pub max_workers: usize,

    /// How long a forwarded stop may go unanswered before the session is
    /// force-failed. Zero disables the deadline.
    /// Default: 30000
    #[serde(default = "PoolSection::default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Interval of the coordinator's stop-deadline sweep.
    /// Default: 1000
    #[serde(default = "PoolSection::default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl PoolSection {
    fn default_max_workers() -> usize {
        4
    }

    fn default_stop_timeout_ms() -> u64 {
        30_000
    }

    fn default_sweep_interval_ms() -> u64 {
        1_000
    }
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_workers: Self::default_max_workers(),
            stop_timeout_ms: Self::default_stop_timeout_ms(),
            sweep_interval_ms: Self::default_sweep_interval_ms(),
        }
    }
}

/// Channel sizing for the notification bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsSection {
    /// Outbound session event broadcast buffer.
    /// Default: 256
    #[serde(default = "EventsSection::default_capacity")]
    pub capacity: usize,

    /// Inbound control request buffer.
    /// Default: 256
    #[serde(default = "EventsSection::default_control_buffer")]
    pub control_buffer: usize,
}

impl EventsSection {
    fn default_capacity() -> usize {
        256
    }

    fn default_control_buffer() -> usize {
        256
    }
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            control_buffer: Self::default_control_buffer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// Log level or full filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetrySection::default_log_level")]
    pub log_level: String,
}

impl TelemetrySection {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
