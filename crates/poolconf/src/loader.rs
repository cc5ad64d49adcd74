//! Config file discovery, loading, and environment variable overlay.

use crate::settings::{EventsSection, PoolSection, TelemetrySection};
use crate::{ConfigError, PoolConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only returns
/// files that exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/streampool/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("streampool/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("streampool.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<PoolConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<PoolConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Pick `overlay` when it differs from the compiled default, else keep `base`.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs, with `overlay` taking precedence field by field.
pub fn merge_configs(base: PoolConfig, overlay: PoolConfig) -> PoolConfig {
    let pool_default = PoolSection::default();
    let events_default = EventsSection::default();
    let telemetry_default = TelemetrySection::default();

    PoolConfig {
        pool: PoolSection {
            max_workers: pick(
                base.pool.max_workers,
                overlay.pool.max_workers,
                pool_default.max_workers,
            ),
            stop_timeout_ms: pick(
                base.pool.stop_timeout_ms,
                overlay.pool.stop_timeout_ms,
                pool_default.stop_timeout_ms,
            ),
            sweep_interval_ms: pick(
                base.pool.sweep_interval_ms,
                overlay.pool.sweep_interval_ms,
                pool_default.sweep_interval_ms,
            ),
        },
        events: EventsSection {
            capacity: pick(
                base.events.capacity,
                overlay.events.capacity,
                events_default.capacity,
            ),
            control_buffer: pick(
                base.events.control_buffer,
                overlay.events.control_buffer,
                events_default.control_buffer,
            ),
        },
        telemetry: TelemetrySection {
            log_level: pick(
                base.telemetry.log_level,
                overlay.telemetry.log_level,
                telemetry_default.log_level,
            ),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut PoolConfig, sources: &mut ConfigSources) {
    apply_overrides_with(config, sources, |name| env::var(name).ok());
}

fn apply_overrides_with<F>(config: &mut PoolConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("STREAMPOOL_MAX_WORKERS") {
        if let Ok(n) = v.parse() {
            config.pool.max_workers = n;
            sources.env_overrides.push("STREAMPOOL_MAX_WORKERS".to_string());
        }
    }
    if let Some(v) = lookup("STREAMPOOL_STOP_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.pool.stop_timeout_ms = ms;
            sources.env_overrides.push("STREAMPOOL_STOP_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("STREAMPOOL_EVENT_CAPACITY") {
        if let Ok(n) = v.parse() {
            config.events.capacity = n;
            sources.env_overrides.push("STREAMPOOL_EVENT_CAPACITY".to_string());
        }
    }
    if let Some(v) = lookup("STREAMPOOL_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("STREAMPOOL_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}
