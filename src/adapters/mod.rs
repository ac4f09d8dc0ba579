//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`LogNotifier`] - Notifications routed through `tracing`
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Scripted HTTP responses and streams
//! - [`mock::StubDirectory`] - In-memory conversation directory
//! - [`mock::RecordingNotifier`] - Captured notifications

pub mod log_notifier;
pub mod mock;
pub mod reqwest_http;

pub use log_notifier::LogNotifier;
pub use mock::{MockHttpClient, RecordingNotifier, StubDirectory};
pub use reqwest_http::ReqwestHttpClient;
