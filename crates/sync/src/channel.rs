//! Push-channel endpoint resolution and handshake.
//!
//! The channel lives on the same host as the REST API. Its URL is
//! derived from the backend origin, switching to `wss` when the origin
//! is served over TLS.

use reqwest::Url;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::SyncError;

/// Default path of the progress channel.
pub const DEFAULT_CHANNEL_PATH: &str = "/ws/progress";

/// Raw websocket stream for one channel connection.
pub type ChannelStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Resolved websocket endpoint for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTarget {
    url: Url,
}

impl ChannelTarget {
    /// Build the channel URL from a backend origin such as
    /// `https://studio.example.com` or `http://127.0.0.1:8000`.
    ///
    /// `https` (and `wss`) origins select the secure variant.
    pub fn from_origin(origin: &str, path: &str) -> Result<Self, SyncError> {
        let origin = Url::parse(origin)
            .map_err(|e| SyncError::Config(format!("Invalid origin '{origin}': {e}")))?;

        let scheme = match origin.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(SyncError::Config(format!(
                    "Unsupported origin scheme '{other}', expected http or https"
                )))
            }
        };
        let host = origin
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("Origin '{origin}' has no host")))?;
        let authority = match origin.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let url = Url::parse(&format!("{scheme}://{authority}{path}"))
            .map_err(|e| SyncError::Config(format!("Invalid channel URL: {e}")))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }

    /// Perform the websocket handshake.
    pub async fn connect(&self) -> Result<ChannelStream, SyncError> {
        let (stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            SyncError::Connection(format!("Failed to connect to {}: {e}", self.url))
        })?;
        Ok(stream)
    }
}
