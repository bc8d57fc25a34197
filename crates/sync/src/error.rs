//! Gateway error types and their classification.

use cartwheel_core::SyncErrorKind;
use thiserror::Error;

/// Errors produced by a cart gateway round trip.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a usable server response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server responded with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// The response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl GatewayError {
    /// Classify this failure for the state machine.
    #[must_use]
    pub const fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Http(_) => SyncErrorKind::Network,
            Self::Status { .. } => SyncErrorKind::Server,
            Self::Payload(_) => SyncErrorKind::Malformed,
        }
    }
}
