//! Keep-alive policy for an open push channel.
//!
//! While connected, the client sends the literal text `ping` on a fixed
//! interval. The server owes no reply. The ticker only exists inside an
//! established session and each tick re-checks the live status, so a
//! ping is never attempted while connecting, closing or disconnected.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::connection::ConnectionStatus;

pub use artforge_core::progress::KEEPALIVE_PAYLOAD;

/// Interval between keep-alive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Whether a ping may be sent in the given state.
pub fn may_ping(status: ConnectionStatus) -> bool {
    status == ConnectionStatus::Connected
}

/// Ticker for one session. The first tick fires one full `period` after
/// the session opened, never immediately.
pub fn keepalive_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
