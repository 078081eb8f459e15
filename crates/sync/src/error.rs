use artforge_core::error::CoreError;

use crate::api::ApiError;

/// Errors surfaced by the synchronization core.
///
/// Transport faults on the push channel never appear here: the
/// connection manager recovers from them by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid or missing configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request was rejected before being sent.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A REST call backing a submission failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A push-channel frame could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The push channel could not be established.
    #[error("Connection error: {0}")]
    Connection(String),
}
