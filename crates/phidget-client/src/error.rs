//! Client error types.

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the gateway.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Connection, timeout or body encoding failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with something other than 200.
    #[error("Gateway returned HTTP {status}: {body}")]
    Status {
        /// HTTP status returned
        status: u16,
        /// Response body text
        body: String,
    },
}

impl ClientError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
