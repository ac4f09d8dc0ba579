//! Mock implementations for testing.
//!
//! - [`MockHttpClient`] - HTTP client with scripted responses and streams
//! - [`StubDirectory`] - In-memory conversation directory
//! - [`RecordingNotifier`] - Captures user-visible notifications

pub mod directory;
pub mod http;
pub mod notifier;

pub use directory::StubDirectory;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use notifier::RecordingNotifier;
