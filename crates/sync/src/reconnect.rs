//! Reconnection delay policy for the push channel.
//!
//! Every disconnect is treated the same way: wait, then reconnect. By
//! default the wait is a fixed 3 seconds forever (multiplier `1.0`). A
//! multiplier above one turns this into capped exponential backoff; the
//! delay resets to [`ReconnectConfig::initial_delay`] after every
//! successful connection.

use std::time::Duration;

/// Default wait between a disconnect and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Wait after a disconnect, and after every successful session.
    pub initial_delay: Duration,
    /// Ceiling once backoff kicks in.
    pub max_delay: Duration,
    /// `1.0` keeps the delay fixed.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Retry forever with the same delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }
}

/// Delay to use after `current` has elapsed without a connection,
/// kept within `initial_delay..=max_delay`.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier.max(1.0)) as u64;
    Duration::from_millis(next_ms)
        .min(config.max_delay)
        .max(config.initial_delay)
}
