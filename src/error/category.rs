//! Error category classification.
//!
//! Every error a chat turn can end with maps to one category; the session
//! uses it for logging and the UI for deciding whether to offer a retry.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout or mid-stream read failures.
    Network,

    /// The backend rejected the credentials (HTTP 401/403).
    Auth,

    /// Backend-side failures (HTTP 5xx, unexpected status).
    Server,

    /// The backend sent something this client cannot understand.
    Protocol,

    /// Missing or invalid local configuration.
    Configuration,
}

impl ErrorCategory {
    /// Whether an operation failing with this category is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label suitable for structured logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCategory::Auth,
            408 | 429 => ErrorCategory::Network,
            _ => ErrorCategory::Server,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Protocol.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_category_from_status() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from_status(502), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::Server);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
        assert_eq!(format!("{}", ErrorCategory::Protocol), "protocol");
    }
}
