//! Error types for the finale labeler.
//!
//! Errors split into two families: systemic failures (bad credentials,
//! unreachable endpoints, malformed configuration) that abort a run, and
//! per-item failures that callers log and skip.

use thiserror::Error;

/// Error type for finale labeler operations
#[derive(Error, Debug)]
pub enum FinaleError {
    /// HTTP request failed at the transport layer
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API key or token was rejected (HTTP 401)
    #[error("{service} rejected the configured credentials (HTTP 401)")]
    Unauthorized { service: &'static str },

    /// The API endpoint itself was not found (HTTP 404 on a base route)
    #[error("{service} API not found at {url}, check the configured URL")]
    EndpointNotFound { service: &'static str, url: String },

    /// Connection to the service could not be established
    #[error("could not connect to {service} at {url}")]
    Connection { service: &'static str, url: String },

    /// The service did not answer within the request timeout
    #[error("connection to {service} timed out")]
    Timeout { service: &'static str },

    /// The service answered with an unexpected status code
    #[error("{service} returned unexpected status {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    /// The response body could not be decoded as the expected shape
    #[error("invalid response from {service}: {detail}")]
    InvalidResponse { service: &'static str, detail: String },

    /// Rate limited by the remote service after all retries (HTTP 429)
    #[error("rate limited by {service} - too many requests")]
    RateLimited { service: &'static str },

    /// Configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration is structurally valid but semantically wrong
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured library section does not exist on the media server
    #[error("library '{0}' not found on the Plex server")]
    LibraryNotFound(String),
}

/// Result type alias for finale labeler operations
pub type Result<T> = std::result::Result<T, FinaleError>;

impl FinaleError {
    /// Map a transport-level [`reqwest::Error`] to a diagnostic variant.
    ///
    /// Timeouts and refused connections get their own variants so the
    /// top-level abort message names the failure kind; anything else is
    /// passed through as [`FinaleError::Http`].
    pub fn from_transport(service: &'static str, url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FinaleError::Timeout { service }
        } else if err.is_connect() {
            FinaleError::Connection {
                service,
                url: url.to_string(),
            }
        } else {
            FinaleError::Http(err)
        }
    }
}
