//! Stream callbacks for one turn.

use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::traits::Notifier;
use crate::transport::StreamHandler;

use super::state::{SessionState, StreamStatus};
use super::ChangeNotifier;

/// A local file to upload before the turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    pub data: Vec<u8>,
}

/// How an uploaded file is attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// `None` for content types the chat endpoint cannot take.
    pub fn media_kind(&self) -> Option<MediaKind> {
        let content_type = self.content_type.to_ascii_lowercase();
        if content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if content_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// Applies transport callbacks to the session, guarded by the turn id.
pub(super) struct TurnHandler {
    pub(super) state: Arc<Mutex<SessionState>>,
    pub(super) changes: ChangeNotifier,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) turn_id: u64,
    /// Set when `on_done` released this turn
    pub(super) completed: bool,
}

impl TurnHandler {
    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StreamHandler for TurnHandler {
    fn on_event(&mut self, event: &str, data: &str) {
        {
            let mut state = self.lock();
            if !state.is_current(self.turn_id) {
                return;
            }
            state.apply_event(event, data);
        }
        self.changes.bump();
    }

    fn on_error(&mut self, error: TransportError) {
        let released = self.lock().release(self.turn_id, StreamStatus::Error);
        if !released {
            tracing::debug!("Dropping error from stale turn {}: {}", self.turn_id, error);
            return;
        }
        tracing::warn!("Turn {} failed: {}", self.turn_id, error);
        self.notifier.notify_error(&error.user_message());
        self.changes.bump();
    }

    fn on_done(&mut self) {
        let released = self.lock().release(self.turn_id, StreamStatus::Idle);
        self.completed = released;
        if released {
            tracing::info!("Turn {} completed", self.turn_id);
            self.changes.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::RecordingNotifier;

    fn handler_for(state: &Arc<Mutex<SessionState>>, turn_id: u64) -> TurnHandler {
        TurnHandler {
            state: Arc::clone(state),
            changes: ChangeNotifier::new(),
            notifier: Arc::new(RecordingNotifier::new()),
            turn_id,
            completed: false,
        }
    }

    #[test]
    fn test_done_marks_current_turn_completed() {
        let state = Arc::new(Mutex::new(SessionState::new(None)));
        let active = state.lock().unwrap().begin_request(StreamStatus::Streaming);

        let mut handler = handler_for(&state, active.turn_id);
        handler.on_done();

        assert!(handler.completed);
        let state = state.lock().unwrap();
        assert_eq!(state.stream_status, StreamStatus::Idle);
        assert!(state.active_request.is_none());
    }

    #[test]
    fn test_done_from_stale_turn_is_ignored() {
        let state = Arc::new(Mutex::new(SessionState::new(None)));
        let first = state.lock().unwrap().begin_request(StreamStatus::Streaming);
        let second = state.lock().unwrap().begin_request(StreamStatus::Streaming);

        let mut stale = handler_for(&state, first.turn_id);
        stale.on_done();

        assert!(!stale.completed);
        let state = state.lock().unwrap();
        assert_eq!(state.stream_status, StreamStatus::Streaming);
        assert_eq!(state.active_request.as_ref().map(|a| a.turn_id), Some(second.turn_id));
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(
            FileUpload::new("a.png", "image/png", vec![]).media_kind(),
            Some(MediaKind::Image)
        );
        assert_eq!(
            FileUpload::new("a.mp3", "Audio/MPEG", vec![]).media_kind(),
            Some(MediaKind::Audio)
        );
        assert_eq!(FileUpload::new("a.pdf", "application/pdf", vec![]).media_kind(), None);
    }
}
