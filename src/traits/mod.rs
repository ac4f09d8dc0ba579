//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, streaming POST)
//! - [`ConversationDirectory`] - The conversation list the session refreshes
//! - [`Notifier`] - User-visible error notifications

pub mod directory;
pub mod http;
pub mod notifier;

pub use directory::ConversationDirectory;
pub use http::{ByteStream, Headers, HttpClient, HttpError, Response, StreamResponse};
pub use notifier::Notifier;
