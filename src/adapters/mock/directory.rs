//! In-memory conversation directory for session tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::ApiError;
use crate::traits::ConversationDirectory;

#[derive(Debug, Default)]
struct Inner {
    /// Id the next refresh makes visible as the latest conversation
    pending_latest: Option<String>,
    latest: Option<String>,
    active: Option<String>,
    fetches: Vec<bool>,
    fail_next: Option<ApiError>,
}

/// Directory double that records refreshes and activations.
///
/// A refresh "discovers" whatever id was staged with
/// [`StubDirectory::stage_new_conversation`], mimicking the backend
/// creating a conversation during the first turn.
#[derive(Debug, Clone, Default)]
pub struct StubDirectory {
    inner: Arc<Mutex<Inner>>,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_new_conversation(&self, id: &str) {
        self.inner.lock().unwrap().pending_latest = Some(id.to_string());
    }

    pub fn fail_next_fetch(&self, err: ApiError) {
        self.inner.lock().unwrap().fail_next = Some(err);
    }

    /// `reset` flag of every fetch, in call order.
    pub fn fetches(&self) -> Vec<bool> {
        self.inner.lock().unwrap().fetches.clone()
    }

    pub fn active(&self) -> Option<String> {
        self.inner.lock().unwrap().active.clone()
    }
}

#[async_trait]
impl ConversationDirectory for StubDirectory {
    async fn fetch_conversations(&self, reset: bool) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push(reset);
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        if let Some(id) = inner.pending_latest.take() {
            inner.latest = Some(id);
        }
        Ok(())
    }

    fn latest_conversation_id(&self) -> Option<String> {
        self.inner.lock().unwrap().latest.clone()
    }

    fn set_active_conversation(&self, id: &str) {
        self.inner.lock().unwrap().active = Some(id.to_string());
    }
}
