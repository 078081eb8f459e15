/// Errors from the export path.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The HTTP request itself failed (network, DNS, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered a fetch with a non-2xx status.
    #[error("Fetching {url} returned {status}")]
    Status { url: String, status: u16 },

    /// The URL could not be resolved against the origin.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
