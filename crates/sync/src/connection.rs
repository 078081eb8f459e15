//! Push-channel connection lifecycle.
//!
//! [`ConnectionManager`] owns one websocket to the backend progress
//! channel and keeps it alive for as long as it is running:
//!
//! ```text
//! disconnected --connect()--> connecting --open--> connected
//!      ^                                              |
//!      +---- (reconnect delay) <---- close / error ---+
//! ```
//!
//! There is no terminal state: a dropped or refused connection is
//! retried after the reconnect delay until [`ConnectionManager::shutdown`]
//! is called or the manager is dropped. Inbound text frames are handed
//! to a [`FrameSink`] one at a time, in arrival order. Transport faults
//! are never surfaced as errors; observers only see the status signal.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelStream, ChannelTarget};
use crate::keepalive::{keepalive_ticker, may_ping, DEFAULT_KEEPALIVE_INTERVAL, KEEPALIVE_PAYLOAD};
use crate::reconnect::{next_delay, ReconnectConfig};

/// Buffer for status transitions kept for slow subscribers.
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// How long [`ConnectionManager::shutdown`] waits for the connection task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Observable state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// A handshake is in progress.
    Connecting,
    /// The channel is open and frames are flowing.
    Connected,
    /// No channel; a reconnect may be pending.
    Disconnected,
}

/// Receiver of inbound text frames.
///
/// Called synchronously from the connection task, so implementations
/// must not block and must not panic on bad input: a malformed frame is
/// the sink's problem to log and drop, never a reason to drop the
/// connection.
pub trait FrameSink: Send + Sync + 'static {
    fn on_frame(&self, text: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub reconnect: ReconnectConfig,
    pub keepalive_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// Current status plus a log of transitions.
///
/// The watch half answers "what is the status now"; the broadcast half
/// lets observers see every transition, including ones that happen
/// faster than they poll.
struct StatusSignal {
    current: watch::Sender<ConnectionStatus>,
    transitions: broadcast::Sender<ConnectionStatus>,
}

impl StatusSignal {
    fn new() -> Self {
        let (current, _) = watch::channel(ConnectionStatus::Disconnected);
        let (transitions, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            current,
            transitions,
        }
    }

    fn get(&self) -> ConnectionStatus {
        *self.current.borrow()
    }

    fn set(&self, status: ConnectionStatus) {
        let previous = self.current.send_replace(status);
        if previous != status {
            tracing::debug!(from = ?previous, to = ?status, "Channel status changed");
            // Zero receivers is fine.
            let _ = self.transitions.send(status);
        }
    }
}

/// Manages the single push-channel connection of a session.
pub struct ConnectionManager {
    target: ChannelTarget,
    config: ConnectionConfig,
    sink: Arc<dyn FrameSink>,
    signal: Arc<StatusSignal>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state. Nothing happens
    /// until [`connect`](Self::connect) is called.
    pub fn new(target: ChannelTarget, config: ConnectionConfig, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            target,
            config,
            sink,
            signal: Arc::new(StatusSignal::new()),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.signal.get()
    }

    /// Receiver that always holds the latest status.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.signal.current.subscribe()
    }

    /// Receive every status transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.signal.transitions.subscribe()
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.target
    }

    /// Start the connection task.
    ///
    /// The status flips to `Connecting` before this returns, ahead of the
    /// handshake, so observers can tell "attempting" from "established".
    /// Calling this while the task is already running is a no-op.
    pub fn connect(&mut self) {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!(url = %self.target.url(), "Connection task already running");
            return;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        self.signal.set(ConnectionStatus::Connecting);

        let target = self.target.clone();
        let config = self.config.clone();
        let sink = Arc::clone(&self.sink);
        let signal = Arc::clone(&self.signal);
        let cancel = self.cancel.clone();

        self.task = Some(tokio::spawn(async move {
            run_connection_loop(&target, &config, sink.as_ref(), &signal, &cancel).await;
        }));
    }

    /// Stop the keep-alive ticker and any pending reconnect, close the
    /// socket, and wait for the connection task to exit.
    pub async fn shutdown(&mut self) {
        tracing::info!(url = %self.target.url(), "Shutting down progress channel");
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!("Connection task did not exit in time");
            }
        }
        self.signal.set(ConnectionStatus::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // The task owns the socket and timers; cancelling releases them.
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Remote close, receive error, or failed ping. Reconnect.
    Dropped,
    /// Local teardown. Stop.
    Cancelled,
}

/// Connect -> run session -> wait -> reconnect, until cancelled.
async fn run_connection_loop(
    target: &ChannelTarget,
    config: &ConnectionConfig,
    sink: &dyn FrameSink,
    signal: &StatusSignal,
    cancel: &CancellationToken,
) {
    let mut delay = config.reconnect.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        signal.set(ConnectionStatus::Connecting);
        let connection_id = uuid::Uuid::new_v4();
        tracing::info!(
            url = %target.url(),
            %connection_id,
            attempt,
            "Connecting to progress channel",
        );

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = target.connect() => result,
        };

        match result {
            Ok(stream) => {
                signal.set(ConnectionStatus::Connected);
                tracing::info!(%connection_id, attempt, "Progress channel connected");
                attempt = 0;
                delay = config.reconnect.initial_delay;

                let end = run_session(stream, sink, signal, config.keepalive_interval, cancel).await;
                if end == SessionEnd::Cancelled {
                    break;
                }
                tracing::info!(%connection_id, "Progress channel dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Progress channel connection failed");
            }
        }

        signal.set(ConnectionStatus::Disconnected);
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to progress channel after delay",
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &config.reconnect);
    }

    signal.set(ConnectionStatus::Disconnected);
    tracing::info!(url = %target.url(), "Progress channel task exited");
}

/// Drive one open connection: deliver frames, send keep-alive pings,
/// and watch for teardown.
async fn run_session(
    stream: ChannelStream,
    sink: &dyn FrameSink,
    signal: &StatusSignal,
    keepalive_interval: Duration,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut writer, mut reader) = stream.split();
    let mut ticker = keepalive_ticker(keepalive_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = writer.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                return SessionEnd::Cancelled;
            }
            _ = ticker.tick() => {
                if !may_ping(signal.get()) {
                    continue;
                }
                if let Err(e) = writer.send(Message::Text(KEEPALIVE_PAYLOAD.to_string())).await {
                    tracing::warn!(error = %e, "Keep-alive ping failed");
                    return SessionEnd::Dropped;
                }
                tracing::trace!("Keep-alive ping sent");
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => sink.on_frame(&text),
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Progress channel closed by server");
                    return SessionEnd::Dropped;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Progress channel receive error");
                    return SessionEnd::Dropped;
                }
                None => {
                    tracing::info!("Progress channel stream exhausted");
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}
