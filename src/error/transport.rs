//! Errors that end a streaming turn.
//!
//! Cancellation is deliberately absent: a cancelled turn is not an error and
//! never produces one of these.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::traits::HttpError;

/// Fallback text shown when an error carries no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Failure of one stream transport invocation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status; the body was not read.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The response had no readable body.
    #[error("Response has no readable body")]
    MissingBody,

    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Request(HttpError),

    /// Reading the body failed after the stream had started.
    #[error("Stream read failed: {0}")]
    Read(HttpError),

    /// The request body could not be serialized.
    #[error("Invalid request body: {0}")]
    Encode(String),

    /// A pre-stream step (such as uploading an attachment) failed.
    #[error("{0}")]
    Upload(String),
}

impl TransportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransportError::Status { status, .. } => ErrorCategory::from_status(*status),
            TransportError::MissingBody | TransportError::Encode(_) => ErrorCategory::Protocol,
            TransportError::Request(_) | TransportError::Read(_) => ErrorCategory::Network,
            TransportError::Upload(_) => ErrorCategory::Server,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Message for the user-visible notification.
    ///
    /// Falls back to [`GENERIC_ERROR_MESSAGE`] when the error has nothing
    /// useful to say.
    pub fn user_message(&self) -> String {
        let message = match self {
            TransportError::Status { status, reason } if reason.trim().is_empty() => {
                format!("HTTP {}", status)
            }
            other => other.to_string(),
        };

        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}
