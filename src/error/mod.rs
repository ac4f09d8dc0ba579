//! Error handling for kbchat.
//!
//! - **Error Categories**: high-level classification for retry decisions
//! - **Transport errors**: failures that end a streaming turn
//! - **API errors**: failures of the plain REST endpoints
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, timeout, mid-read failure | Yes |
//! | Auth | Credentials rejected | No |
//! | Server | Backend errors (5xx) | Yes |
//! | Protocol | Unexpected wire data | No |
//! | Configuration | Bad local config | No |
//!
//! Malformed `references` payloads are protocol errors too, but they are
//! swallowed inside the session and never become one of these types.

mod api;
mod category;
mod transport;

pub use api::ApiError;
pub use category::ErrorCategory;
pub use transport::{TransportError, GENERIC_ERROR_MESSAGE};
