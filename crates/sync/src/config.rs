use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::DEFAULT_REQUEST_TIMEOUT;
use crate::channel::DEFAULT_CHANNEL_PATH;
use crate::connection::ConnectionConfig;
use crate::error::SyncError;
use crate::keepalive::DEFAULT_KEEPALIVE_INTERVAL;
use crate::reconnect::{ReconnectConfig, DEFAULT_RECONNECT_DELAY};

/// Backend origin used when `ARTFORGE_ORIGIN` is unset.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Directory exports are written to when `EXPORT_DIR` is unset.
pub const DEFAULT_EXPORT_DIR: &str = "./downloads";

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Backend origin, e.g. `https://studio.example.com`.
    pub origin: String,
    /// Path of the progress channel on the origin host.
    pub channel_path: String,
    pub connection: ConnectionConfig,
    /// Timeout applied to every REST request.
    pub request_timeout: Duration,
    /// Where downloads and archives are written.
    pub export_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            connection: ConnectionConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                  |
    /// |--------------------------|--------------------------|
    /// | `ARTFORGE_ORIGIN`        | `http://127.0.0.1:8000`  |
    /// | `ARTFORGE_CHANNEL_PATH`  | `/ws/progress`           |
    /// | `RECONNECT_DELAY_MS`     | `3000`                   |
    /// | `RECONNECT_MAX_DELAY_MS` | `RECONNECT_DELAY_MS`     |
    /// | `RECONNECT_MULTIPLIER`   | `1.0`                    |
    /// | `KEEPALIVE_INTERVAL_MS`  | `5000`                   |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                     |
    /// | `EXPORT_DIR`             | `./downloads`            |
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let origin = lookup("ARTFORGE_ORIGIN").unwrap_or(defaults.origin);
        let channel_path = lookup("ARTFORGE_CHANNEL_PATH").unwrap_or(defaults.channel_path);

        let delay_ms: u64 = parse_var(&lookup, "RECONNECT_DELAY_MS")?
            .unwrap_or(DEFAULT_RECONNECT_DELAY.as_millis() as u64);
        let max_delay_ms: u64 = parse_var(&lookup, "RECONNECT_MAX_DELAY_MS")?.unwrap_or(delay_ms);
        let multiplier: f64 = parse_var(&lookup, "RECONNECT_MULTIPLIER")?.unwrap_or(1.0);
        if delay_ms == 0 {
            return Err(SyncError::Config("RECONNECT_DELAY_MS must be greater than 0".into()));
        }
        if max_delay_ms < delay_ms {
            return Err(SyncError::Config(
                "RECONNECT_MAX_DELAY_MS must not be below RECONNECT_DELAY_MS".into(),
            ));
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(SyncError::Config(format!(
                "RECONNECT_MULTIPLIER must be at least 1.0, got {multiplier}"
            )));
        }

        let keepalive_ms: u64 = parse_var(&lookup, "KEEPALIVE_INTERVAL_MS")?
            .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL.as_millis() as u64);
        if keepalive_ms == 0 {
            return Err(SyncError::Config("KEEPALIVE_INTERVAL_MS must be greater than 0".into()));
        }

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs());

        let export_dir = lookup("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.export_dir);

        Ok(Self {
            origin,
            channel_path,
            connection: ConnectionConfig {
                reconnect: ReconnectConfig {
                    initial_delay: Duration::from_millis(delay_ms),
                    max_delay: Duration::from_millis(max_delay_ms),
                    multiplier,
                },
                keepalive_interval: Duration::from_millis(keepalive_ms),
            },
            request_timeout: Duration::from_secs(request_timeout_secs),
            export_dir,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, SyncError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("{key} must be a valid number, got '{raw}': {e}"))),
    }
}
