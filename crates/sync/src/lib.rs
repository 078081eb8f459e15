//! Progress-synchronization core.
//!
//! Keeps client-side job state consistent with a backend that reports
//! progress over a single push channel:
//!
//! - [`connection::ConnectionManager`] owns the websocket lifecycle
//!   (connect, keep-alive, fixed-delay reconnect, teardown).
//! - [`router::MessageRouter`] decodes frames and dispatches them by
//!   task kind.
//! - [`reconcile`] holds one reconciler per job domain, each publishing
//!   its state through a `tokio::sync::watch` channel.
//! - [`api`] is the REST boundary used to submit jobs.
//! - [`session::SyncSession`] wires everything together.

pub mod api;
pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod keepalive;
pub mod reconcile;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod style;

#[cfg(test)]
mod testing;

pub use config::SyncConfig;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionStatus, FrameSink};
pub use error::SyncError;
pub use router::{MessageRouter, RouteOutcome};
pub use session::SyncSession;
