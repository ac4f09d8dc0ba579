//! Conversation session state machine.
//!
//! A [`ChatSession`] owns one conversation: the message list, the stream
//! status and the in-flight request. Turns run on spawned tasks and report
//! back through [`turn::TurnHandler`], which checks the turn id before every
//! mutation so a cancelled or replaced turn can never touch newer state.
//!
//! ```text
//! Idle --send--> Streaming --done--> Idle
//!   |               |  \--error--> Error
//!   |               \--stop------> Idle
//!   \--send_with_attachments--> Uploading --uploaded--> Streaming
//! ```
//!
//! Readers either poll [`ChatSession::snapshot`] or wait on the revision
//! counter from [`ChatSession::subscribe`], which is bumped on every change.

mod state;
mod turn;

pub use state::{
    ActiveRequest, SessionSnapshot, SessionState, StreamStatus, EVENT_ANSWER, EVENT_IMAGE,
    EVENT_REASONING, EVENT_REFERENCES,
};
pub use turn::{FileUpload, MediaKind};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::error::{ApiError, TransportError};
use crate::models::{Attachment, ChatRequest, ConversationDetail};
use crate::traits::{ConversationDirectory, Notifier};
use crate::transport::{StreamHandler, StreamTransport};

use turn::TurnHandler;

/// Revision counter shared with subscribers.
#[derive(Clone)]
pub(crate) struct ChangeNotifier(Arc<watch::Sender<u64>>);

impl ChangeNotifier {
    fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self(Arc::new(tx))
    }

    pub(crate) fn bump(&self) {
        self.0.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

/// Everything a spawned turn needs once the user message is in place.
struct PreparedTurn {
    active: ActiveRequest,
    request: ChatRequest,
    started_without_id: bool,
    epoch: u64,
}

/// One conversation and its streaming lifecycle.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ChatSession {
    api: ApiClient,
    transport: StreamTransport,
    directory: Arc<dyn ConversationDirectory>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<SessionState>>,
    changes: ChangeNotifier,
    refresh_delay: Duration,
}

impl ChatSession {
    pub fn new(
        api: ApiClient,
        directory: Arc<dyn ConversationDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = api.config();
        let state = SessionState::new(config.model_id);
        let refresh_delay = config.refresh_delay;
        Self {
            transport: StreamTransport::new(api.http()),
            api,
            directory,
            notifier,
            state: Arc::new(Mutex::new(state)),
            changes: ChangeNotifier::new(),
            refresh_delay,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> StreamStatus {
        self.lock().stream_status
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.lock().conversation_id.clone()
    }

    /// Revision counter bumped after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Start a turn. Returns the handle of the spawned stream task, or
    /// `None` when there is nothing to send or the conversation is archived.
    ///
    /// A turn already in flight is cancelled and replaced.
    pub fn send_message(
        &self,
        text: impl Into<String>,
        image_urls: Vec<String>,
        audio_url: Option<String>,
    ) -> Option<JoinHandle<()>> {
        let text = text.into();
        let audio_url = audio_url.filter(|url| !url.is_empty());
        if text.trim().is_empty() && image_urls.is_empty() && audio_url.is_none() {
            tracing::debug!("Ignoring empty message");
            return None;
        }

        let prepared = {
            let mut state = self.lock();
            if state.is_archived {
                tracing::warn!("Cannot send to an archived conversation");
                return None;
            }
            let active = state.begin_request(StreamStatus::Streaming);
            prepare_turn(&mut state, active, &text, image_urls, audio_url)
        };
        self.changes.bump();

        let session = self.clone();
        Some(tokio::spawn(async move { session.run_turn(prepared).await }))
    }

    /// Upload `files`, then start a turn with the hosted URLs.
    ///
    /// Images become `imageUrls`; the last audio file becomes `audioUrl`.
    /// Files of any other type are skipped.
    pub fn send_with_attachments(
        &self,
        text: impl Into<String>,
        files: Vec<FileUpload>,
    ) -> Option<JoinHandle<()>> {
        let text = text.into();
        let files: Vec<(MediaKind, FileUpload)> = files
            .into_iter()
            .filter_map(|file| match file.media_kind() {
                Some(kind) => Some((kind, file)),
                None => {
                    tracing::warn!("Skipping unsupported attachment {} ({})", file.file_name, file.content_type);
                    None
                }
            })
            .collect();

        if files.is_empty() {
            return self.send_message(text, Vec::new(), None);
        }

        let active = {
            let mut state = self.lock();
            if state.is_archived {
                tracing::warn!("Cannot send to an archived conversation");
                return None;
            }
            state.begin_request(StreamStatus::Uploading)
        };
        self.changes.bump();

        let session = self.clone();
        Some(tokio::spawn(async move {
            session.upload_then_stream(active, text, files).await
        }))
    }

    /// Cancel the in-flight turn. Partial output stays; nobody is notified.
    pub fn stop_streaming(&self) -> bool {
        let stopped = {
            let mut state = self.lock();
            if !state.stream_status.is_busy() && state.active_request.is_none() {
                return false;
            }
            state.cancel_active();
            state.stream_status = StreamStatus::Idle;
            true
        };
        tracing::info!("Stream stopped");
        self.changes.bump();
        stopped
    }

    /// Re-ask the last user message, discarding it and everything after.
    pub fn regenerate(&self) -> Option<JoinHandle<()>> {
        let last_user = {
            let mut state = self.lock();
            if state.is_archived {
                tracing::warn!("Cannot regenerate in an archived conversation");
                return None;
            }
            let last_user = state.truncate_to_last_user()?;
            if state.cancel_active() {
                state.stream_status = StreamStatus::Idle;
            }
            last_user
        };

        self.send_message(
            last_user.content.clone(),
            last_user.image_attachments(),
            last_user.audio_attachment(),
        )
    }

    /// Replace the session with a persisted conversation.
    pub fn load_conversation(&self, detail: ConversationDetail) {
        self.lock().load(&detail);
        self.directory.set_active_conversation(&detail.id);
        tracing::info!("Loaded conversation {}", detail.id);
        self.changes.bump();
    }

    /// Fetch a conversation and load it.
    pub async fn open_conversation(&self, id: &str) -> Result<(), ApiError> {
        let detail = self.api.get_conversation(id).await?;
        self.load_conversation(detail);
        Ok(())
    }

    /// Start over with an empty conversation.
    pub fn clear(&self) {
        self.lock().reset();
        self.changes.bump();
    }

    /// Toggle the server-side archive flag of the current conversation.
    /// Archiving stops a turn in flight.
    pub async fn set_archived(&self, archived: bool) -> Result<(), ApiError> {
        let Some(id) = self.conversation_id() else {
            tracing::debug!("No conversation to archive yet");
            return Ok(());
        };

        self.api.set_archived(&id, archived).await?;

        {
            let mut state = self.lock();
            if state.conversation_id.as_deref() != Some(id.as_str()) {
                return Ok(());
            }
            state.is_archived = archived;
            if archived && state.cancel_active() {
                state.stream_status = StreamStatus::Idle;
            }
        }
        self.changes.bump();
        Ok(())
    }

    /// Synthesize `text` for `message_id` and mark it as playing.
    /// The audio URL is cached per message.
    pub async fn play_tts(&self, message_id: &str, text: &str) -> Result<String, ApiError> {
        let cached = self.lock().tts_cache.get(message_id).cloned();
        let url = match cached {
            Some(url) => url,
            None => {
                let url = self.api.text_to_speech(text).await?;
                self.lock()
                    .tts_cache
                    .insert(message_id.to_string(), url.clone());
                url
            }
        };

        self.lock().playing_message_id = Some(message_id.to_string());
        self.changes.bump();
        Ok(url)
    }

    pub fn stop_tts(&self) {
        self.lock().playing_message_id = None;
        self.changes.bump();
    }

    pub fn set_knowledge_base_ids(&self, ids: Vec<i64>) {
        self.lock().knowledge_base_ids = ids;
        self.changes.bump();
    }

    pub fn set_prompt_template_id(&self, id: Option<i64>) {
        self.lock().prompt_template_id = id;
        self.changes.bump();
    }

    pub fn set_model_id(&self, id: Option<i64>) {
        self.lock().model_id = id;
        self.changes.bump();
    }

    fn turn_handler(&self, turn_id: u64) -> TurnHandler {
        TurnHandler {
            state: Arc::clone(&self.state),
            changes: self.changes.clone(),
            notifier: Arc::clone(&self.notifier),
            turn_id,
            completed: false,
        }
    }

    async fn upload_then_stream(self, active: ActiveRequest, text: String, files: Vec<(MediaKind, FileUpload)>) {
        let mut image_urls = Vec::new();
        let mut audio_url = None;

        for (kind, file) in files {
            let uploaded = tokio::select! {
                biased;
                _ = active.cancel.cancelled() => return,
                uploaded = self.api.upload_file(&file.file_name, &file.content_type, &file.data) => uploaded,
            };

            match uploaded {
                Ok(url) => match kind {
                    MediaKind::Image => image_urls.push(url),
                    MediaKind::Audio => audio_url = Some(url),
                },
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", file.file_name, e);
                    self.turn_handler(active.turn_id)
                        .on_error(TransportError::Upload(e.to_string()));
                    return;
                }
            }
        }

        let prepared = {
            let mut state = self.lock();
            if !state.is_current(active.turn_id) {
                return;
            }
            state.stream_status = StreamStatus::Streaming;
            prepare_turn(&mut state, active, &text, image_urls, audio_url)
        };
        self.changes.bump();

        self.run_turn(prepared).await
    }

    async fn run_turn(self, turn: PreparedTurn) {
        let turn_id = turn.active.turn_id;
        let url = self.api.chat_url();
        let headers = self.api.config().headers();
        let mut handler = self.turn_handler(turn_id);

        tracing::info!("Turn {} started", turn_id);
        let outcome = self
            .transport
            .run(&url, &turn.request, &headers, &turn.active.cancel, &mut handler)
            .await;
        tracing::debug!("Turn {} finished: {:?}", turn_id, outcome);

        if handler.completed {
            self.refresh_after_turn(turn.started_without_id, turn.epoch).await;
        }
    }

    /// Refresh the directory once the backend has had time to title the
    /// conversation, and adopt the id it allocated for a first turn.
    async fn refresh_after_turn(&self, started_without_id: bool, epoch: u64) {
        tokio::time::sleep(self.refresh_delay).await;

        if self.lock().epoch() != epoch {
            tracing::debug!("Session replaced during refresh delay; skipping refresh");
            return;
        }

        if let Err(e) = self.directory.fetch_conversations(true).await {
            tracing::warn!("Conversation refresh failed: {}", e);
            return;
        }

        if !started_without_id {
            return;
        }

        let Some(id) = self.directory.latest_conversation_id() else {
            tracing::warn!("Directory has no conversation to adopt");
            return;
        };

        let adopted = {
            let mut state = self.lock();
            if state.epoch() != epoch || state.conversation_id.is_some() {
                false
            } else {
                state.conversation_id = Some(id.clone());
                true
            }
        };

        if adopted {
            tracing::info!("Adopted conversation {}", id);
            self.directory.set_active_conversation(&id);
            self.changes.bump();
        }
    }
}

fn prepare_turn(
    state: &mut SessionState,
    active: ActiveRequest,
    text: &str,
    image_urls: Vec<String>,
    audio_url: Option<String>,
) -> PreparedTurn {
    let mut attachments: Vec<Attachment> = image_urls
        .iter()
        .map(|url| Attachment::Image { url: url.clone() })
        .collect();
    if let Some(url) = &audio_url {
        attachments.push(Attachment::Audio { url: url.clone() });
    }

    state.push_turn(text, attachments);
    PreparedTurn {
        active,
        request: state.chat_request(text, image_urls, audio_url),
        started_without_id: state.conversation_id.is_none(),
        epoch: state.epoch(),
    }
}
