//! Session harness over the in-crate test doubles.

pub use kbchat::adapters::mock::{MockHttpClient, MockResponse, RecordingNotifier, StubDirectory};
pub use kbchat::traits::{HttpError, Response};

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use kbchat::api::ApiClient;
use kbchat::config::ClientConfig;
use kbchat::session::ChatSession;

use super::{chat_url, BASE_URL};

/// A session wired to a scripted HTTP client, a stub directory and a
/// notifier that records instead of showing.
pub struct Harness {
    pub session: ChatSession,
    pub http: MockHttpClient,
    pub directory: StubDirectory,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let http = MockHttpClient::new();
        let directory = StubDirectory::new();
        let notifier = RecordingNotifier::new();
        let api = ApiClient::new(Arc::new(http.clone()), config);
        let session = ChatSession::new(
            api,
            Arc::new(directory.clone()),
            Arc::new(notifier.clone()),
        );
        Self {
            session,
            http,
            directory,
            notifier,
        }
    }

    /// Every chat request answers with `body` in one chunk.
    pub fn stream(&self, body: &str) {
        self.http.set_response(
            &chat_url(),
            MockResponse::Stream(vec![Bytes::from(body.to_string())]),
        );
    }

    /// The next chat request answers with these chunks.
    pub fn stream_once(&self, chunks: &[&str]) {
        self.http.push_response(
            &chat_url(),
            MockResponse::Stream(chunks.iter().map(|c| Bytes::from(c.to_string())).collect()),
        );
    }

    /// Bodies of every chat request sent so far, as JSON.
    pub fn chat_bodies(&self) -> Vec<serde_json::Value> {
        self.http
            .requests_to(&chat_url())
            .iter()
            .filter_map(|r| r.json())
            .collect()
    }

    /// Answer `GET`/`POST` on `path` with a JSON body.
    pub fn json_response(&self, path: &str, status: u16, body: serde_json::Value) {
        self.http.set_response(
            &format!("{}/{}", BASE_URL, path),
            MockResponse::Success(Response::new(status, Bytes::from(body.to_string()))),
        );
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new(BASE_URL)
        .with_auth_token("test-token")
        .with_refresh_delay(Duration::from_millis(10))
}

/// Wait until `condition` holds for the session, waking on every change.
///
/// Panics after two seconds so a broken turn fails the test instead of
/// hanging it.
pub async fn wait_until<F>(session: &ChatSession, condition: F)
where
    F: Fn(&kbchat::session::SessionSnapshot) -> bool,
{
    let mut changes = session.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if condition(&session.snapshot()) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "condition not reached: {:?}", session.snapshot());
}
