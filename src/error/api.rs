//! Errors from the non-streaming REST endpoints.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::traits::HttpError;

/// Failure of a REST call made through [`crate::api::ApiClient`].
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Transport-level failure
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Server returned a non-2xx status
    #[error("Server error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// Request body could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Http(_) => ErrorCategory::Network,
            ApiError::Status { status, .. } => ErrorCategory::from_status(*status),
            ApiError::Decode { .. } | ApiError::Encode(_) => ErrorCategory::Protocol,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn decode(what: &'static str, err: serde_json::Error) -> Self {
        ApiError::Decode {
            what,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Server error (404): not found");

        let err: ApiError = HttpError::ConnectionFailed("refused".to_string()).into();
        assert_eq!(err.to_string(), "Connection failed: refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decode_helper() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ApiError::decode("conversation", json_err);
        assert!(err.to_string().starts_with("Failed to decode conversation"));
        assert_eq!(err.category(), ErrorCategory::Protocol);
    }
}
