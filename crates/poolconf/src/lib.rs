//! Configuration loading for streampool.
//!
//! Kept dependency-light so every crate in the workspace can import it.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/streampool/config.toml` (system)
//! 2. `~/.config/streampool/config.toml` (user)
//! 3. `./streampool.toml` (local override, or the `--config` path)
//! 4. Environment variables (`STREAMPOOL_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [pool]
//! max_workers = 4
//! stop_timeout_ms = 30000
//! sweep_interval_ms = 1000
//!
//! [events]
//! capacity = 256
//! control_buffer = 256
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{EventsSection, PoolSection, TelemetrySection};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete streampool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PoolConfig {
    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub events: EventsSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl PoolConfig {
    /// Load configuration and report which files and env vars contributed.
    /// `config_path` replaces the local `./streampool.toml` override; system
    /// and user configs still load first.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = PoolConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Stop deadline, or `None` when disabled.
    pub fn stop_timeout(&self) -> Option<Duration> {
        match self.pool.stop_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.pool.sweep_interval_ms.max(1))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# streampool configuration\n\n");

        output.push_str("[pool]\n");
        output.push_str(&format!("max_workers = {}\n", self.pool.max_workers));
        output.push_str(&format!("stop_timeout_ms = {}\n", self.pool.stop_timeout_ms));
        output.push_str(&format!(
            "sweep_interval_ms = {}\n",
            self.pool.sweep_interval_ms
        ));

        output.push_str("\n[events]\n");
        output.push_str(&format!("capacity = {}\n", self.events.capacity));
        output.push_str(&format!("control_buffer = {}\n", self.events.control_buffer));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
