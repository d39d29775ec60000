use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to a TAP service
#[derive(Debug, Error)]
pub enum TapError {
    /// Connection, timeout or other transport failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with an HTTP error status
    #[error("HTTP {status} from '{url}': {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The service reported `QUERY_STATUS=ERROR` in the result document
    #[error("Query failed: {0}")]
    Query(String),

    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Structurally invalid or unsupported VOTable content
    #[error("VOTable error: {0}")]
    VoTable(String),

    /// A VOSI or DALI document that is empty, truncated or not XML at all
    #[error("Malformed document: {0}")]
    Document(String),

    /// Invalid base64 in a BINARY/BINARY2 stream
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Failure assembling the result DataFrame
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Access URL cannot be parsed
    #[error("Invalid service URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Upload file cannot be read
    #[error("Cannot read upload file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration (bad env vars, zero retries, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TapError {
    /// True when the failure happened below the protocol level: the service
    /// could not be reached, timed out, or answered with an HTTP error status.
    pub fn is_network(&self) -> bool {
        matches!(self, TapError::Network(_) | TapError::Status { .. })
    }

    /// True when retrying the same request may succeed
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            TapError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            TapError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Type alias for Results using TapError
pub type Result<T> = std::result::Result<T, TapError>;
