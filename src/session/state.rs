//! In-memory conversation state and the pure transitions on it.
//!
//! Nothing here awaits; [`super::ChatSession`] takes the lock, calls one of
//! these methods and releases it before any I/O.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::models::{Attachment, ChatRequest, ConversationDetail, Message, Reference};

pub const EVENT_REASONING: &str = "reasoning";
pub const EVENT_ANSWER: &str = "answer";
pub const EVENT_IMAGE: &str = "image";
pub const EVENT_REFERENCES: &str = "references";

/// Turn lifecycle: `Idle -> [Uploading ->] Streaming -> Idle | Error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamStatus {
    #[default]
    Idle,
    /// Attachments are being uploaded ahead of the stream
    Uploading,
    Streaming,
    /// Reserved; a completed turn returns to `Idle`
    Done,
    /// The last turn failed; sending again is allowed
    Error,
}

impl StreamStatus {
    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, StreamStatus::Uploading | StreamStatus::Streaming)
    }
}

/// Ownership handle of the in-flight turn.
#[derive(Debug, Clone)]
pub struct ActiveRequest {
    pub turn_id: u64,
    pub cancel: CancellationToken,
}

/// Cloned view of the session for readers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub conversation_id: Option<String>,
    pub stream_status: StreamStatus,
    pub is_archived: bool,
    pub knowledge_base_ids: Vec<i64>,
    pub prompt_template_id: Option<i64>,
    pub model_id: Option<i64>,
    pub playing_message_id: Option<String>,
}

impl SessionSnapshot {
    /// The assistant message a turn streams into, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub conversation_id: Option<String>,
    pub stream_status: StreamStatus,
    /// Present iff `stream_status.is_busy()`
    pub active_request: Option<ActiveRequest>,
    pub is_archived: bool,
    pub knowledge_base_ids: Vec<i64>,
    pub prompt_template_id: Option<i64>,
    pub model_id: Option<i64>,
    pub playing_message_id: Option<String>,
    /// Synthesized audio URL per message id
    pub(crate) tts_cache: HashMap<String, String>,
    next_turn_id: u64,
    /// Bumped whenever the conversation is replaced (clear or load)
    epoch: u64,
}

impl SessionState {
    pub fn new(model_id: Option<i64>) -> Self {
        Self {
            model_id,
            ..Self::default()
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Timestamp for a new message; never earlier than the last one.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    pub fn is_current(&self, turn_id: u64) -> bool {
        self.active_request
            .as_ref()
            .is_some_and(|active| active.turn_id == turn_id)
    }

    /// Cancel and drop the in-flight request, if any. Returns whether one
    /// existed.
    pub fn cancel_active(&mut self) -> bool {
        match self.active_request.take() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Replace any in-flight request with a fresh one in `status`.
    pub fn begin_request(&mut self, status: StreamStatus) -> ActiveRequest {
        if self.cancel_active() {
            tracing::debug!("Replacing in-flight request");
        }
        self.next_turn_id += 1;
        let active = ActiveRequest {
            turn_id: self.next_turn_id,
            cancel: CancellationToken::new(),
        };
        self.active_request = Some(active.clone());
        self.stream_status = status;
        active
    }

    /// End turn `turn_id` with `status`. No-op for a stale turn.
    pub fn release(&mut self, turn_id: u64, status: StreamStatus) -> bool {
        if !self.is_current(turn_id) {
            return false;
        }
        self.active_request = None;
        self.stream_status = status;
        true
    }

    /// Append the user message and the empty assistant message a turn
    /// streams into.
    pub fn push_turn(&mut self, text: &str, attachments: Vec<Attachment>) {
        let timestamp = self.next_timestamp();
        self.messages.push(Message::user(text, attachments, timestamp));
        self.messages.push(Message::assistant(timestamp));
    }

    /// Request body for the next turn from the current settings.
    pub fn chat_request(
        &self,
        text: &str,
        image_urls: Vec<String>,
        audio_url: Option<String>,
    ) -> ChatRequest {
        ChatRequest::new(text)
            .with_conversation(self.conversation_id.clone())
            .with_model(self.model_id)
            .with_images(image_urls)
            .with_audio(audio_url)
            .with_knowledge_bases(self.knowledge_base_ids.clone())
            .with_prompt_template(self.prompt_template_id)
    }

    /// Apply one stream frame to the open assistant message.
    pub fn apply_event(&mut self, event: &str, data: &str) {
        let Some(message) = self.messages.iter_mut().rev().find(|m| m.is_assistant()) else {
            tracing::debug!("Dropping '{}' frame: no assistant message", event);
            return;
        };

        match event {
            EVENT_REASONING => message.append_reasoning(data),
            EVENT_ANSWER => message.append_answer(data),
            EVENT_IMAGE => {
                let url = data.trim();
                if !url.is_empty() {
                    message.push_image(url);
                }
            }
            EVENT_REFERENCES => {
                let parsed: Result<Vec<Reference>, serde_json::Error> = serde_json::from_str(data);
                match parsed {
                    Ok(references) => message.replace_references(references),
                    Err(e) => tracing::debug!("Ignoring malformed references payload: {}", e),
                }
            }
            other => tracing::trace!("Ignoring '{}' frame", other),
        }
    }

    /// Drop the last user message and everything after it, returning it.
    pub fn truncate_to_last_user(&mut self) -> Option<Message> {
        let index = self.messages.iter().rposition(|m| m.is_user())?;
        let mut tail = self.messages.split_off(index);
        Some(tail.swap_remove(0))
    }

    /// Forget the conversation. The model selection is kept.
    pub fn reset(&mut self) {
        self.cancel_active();
        let model_id = self.model_id;
        let next_turn_id = self.next_turn_id;
        let epoch = self.epoch + 1;
        *self = Self {
            model_id,
            next_turn_id,
            epoch,
            ..Self::default()
        };
    }

    /// Replace the conversation with a persisted transcript.
    pub fn load(&mut self, detail: &ConversationDetail) {
        self.reset();

        let ext = detail.ext().unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable metadata of conversation {}: {}", detail.id, e);
            Default::default()
        });

        self.messages = detail.to_messages();
        self.conversation_id = Some(detail.id.clone());
        self.is_archived = detail.is_archived();
        self.knowledge_base_ids = ext.knowledge_base_ids;
        self.prompt_template_id = ext.prompt_template_id;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            conversation_id: self.conversation_id.clone(),
            stream_status: self.stream_status,
            is_archived: self.is_archived,
            knowledge_base_ids: self.knowledge_base_ids.clone(),
            prompt_template_id: self.prompt_template_id,
            model_id: self.model_id,
            playing_message_id: self.playing_message_id.clone(),
        }
    }
}
