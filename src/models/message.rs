use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::{deserialize_null_default, deserialize_nullable_id, deserialize_nullable_string};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Media the user attached to a turn, already uploaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    Image { url: String },
    Audio { url: String },
}

impl Attachment {
    pub fn url(&self) -> &str {
        match self {
            Attachment::Image { url } | Attachment::Audio { url } => url,
        }
    }
}

/// A retrieval citation attached to an assistant answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Quoted chunk text
    #[serde(default)]
    pub content: String,
    /// Similarity score in `[0, 1]`
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub score: f64,
    /// Empty when the server omits it
    #[serde(default, deserialize_with = "deserialize_nullable_id")]
    pub document_id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub document_name: String,
    #[serde(default, deserialize_with = "deserialize_nullable_id")]
    pub knowledge_base_id: String,
    #[serde(default, deserialize_with = "deserialize_chunk_index")]
    pub chunk_index: u32,
}

/// Negative or null indexes clamp to zero.
fn deserialize_chunk_index<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.map_or(0, |index| u32::try_from(index.max(0)).unwrap_or(u32::MAX)))
}

/// One entry of a conversation.
///
/// `content`, `reasoning_content` and `image_urls` only ever grow while a
/// turn streams into the message; `references` is replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Client-generated, never reused
    pub id: String,
    pub role: MessageRole,
    /// Answer text
    pub content: String,
    /// Thinking text streamed before or alongside the answer
    pub reasoning_content: String,
    /// Generated images, in arrival order
    pub image_urls: Vec<String>,
    pub references: Vec<Reference>,
    /// User-supplied media (user messages only)
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            reasoning_content: String::new(),
            image_urls: Vec::new(),
            references: Vec::new(),
            attachments: Vec::new(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>, timestamp: DateTime<Utc>) -> Self {
        let mut message = Self::new(MessageRole::User, content.into(), timestamp);
        message.attachments = attachments;
        message
    }

    /// Empty assistant message that a turn streams into
    pub fn assistant(timestamp: DateTime<Utc>) -> Self {
        Self::new(MessageRole::Assistant, String::new(), timestamp)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// Append an answer token
    pub fn append_answer(&mut self, token: &str) {
        self.content.push_str(token);
    }

    /// Append a reasoning token
    pub fn append_reasoning(&mut self, token: &str) {
        self.reasoning_content.push_str(token);
    }

    pub fn push_image(&mut self, url: impl Into<String>) {
        self.image_urls.push(url.into());
    }

    pub fn replace_references(&mut self, references: Vec<Reference>) {
        self.references = references;
    }

    pub fn image_attachments(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter_map(|a| match a {
                Attachment::Image { url } => Some(url.clone()),
                Attachment::Audio { .. } => None,
            })
            .collect()
    }

    pub fn audio_attachment(&self) -> Option<String> {
        self.attachments.iter().find_map(|a| match a {
            Attachment::Audio { url } => Some(url.clone()),
            Attachment::Image { .. } => None,
        })
    }

    /// Whether the message has anything to show yet
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
            && self.reasoning_content.is_empty()
            && self.image_urls.is_empty()
            && self.references.is_empty()
            && self.attachments.is_empty()
    }
}
