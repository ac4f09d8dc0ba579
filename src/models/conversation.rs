//! Conversation records as served by the REST endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, deserialize_nullable_string, deserialize_timestamp};
use super::{Attachment, Message, MessageRole};

/// Server-side lifecycle flag of a conversation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    #[serde(alias = "ACTIVE", alias = "normal")]
    Active,
    #[serde(alias = "ARCHIVED")]
    Archived,
    #[serde(other)]
    Unknown,
}

/// One row of the conversation list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ConversationStatus,
}

impl ConversationSummary {
    /// Timestamp used for date grouping: last update, else creation.
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// One page of `GET /conversations`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationPage {
    #[serde(default)]
    pub records: Vec<ConversationSummary>,
    #[serde(default)]
    pub total: u64,
}

/// A persisted message in a conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// `user` or `assistant` (older records use `ai`)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub reasoning_content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StoredMessage {
    pub fn role(&self) -> Option<MessageRole> {
        match self.kind.to_ascii_lowercase().as_str() {
            "user" => Some(MessageRole::User),
            "assistant" | "ai" | "bot" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    /// Convert to a client message; `None` for roles the client does not show.
    ///
    /// `not_before` keeps timestamps non-decreasing when the server omits
    /// them or returns them out of order.
    pub fn to_message(&self, not_before: Option<DateTime<Utc>>) -> Option<Message> {
        let role = self.role()?;
        let timestamp = match (self.timestamp, not_before) {
            (Some(ts), Some(floor)) => ts.max(floor),
            (Some(ts), None) => ts,
            (None, Some(floor)) => floor,
            (None, None) => Utc::now(),
        };

        let message = match role {
            MessageRole::User => {
                let attachments = self
                    .image_urls
                    .iter()
                    .map(|url| Attachment::Image { url: url.clone() })
                    .collect();
                Message::user(self.content.clone(), attachments, timestamp)
            }
            MessageRole::Assistant => {
                let mut message = Message::assistant(timestamp);
                message.content = self.content.clone();
                message.reasoning_content = self.reasoning_content.clone();
                message.image_urls = self.image_urls.clone();
                message
            }
        };
        Some(message)
    }
}

/// Turn settings persisted in a conversation's `extJson`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationExt {
    #[serde(default)]
    pub knowledge_base_ids: Vec<i64>,
    #[serde(default)]
    pub prompt_template_id: Option<i64>,
}

/// `GET /conversations/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub title: String,
    #[serde(default)]
    pub status: ConversationStatus,
    /// Opaque metadata; either a JSON object or a string containing one
    #[serde(default)]
    pub ext_json: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

impl ConversationDetail {
    pub fn is_archived(&self) -> bool {
        self.status == ConversationStatus::Archived
    }

    /// Decode `extJson`.
    pub fn ext(&self) -> Result<ConversationExt, serde_json::Error> {
        match &self.ext_json {
            None | Some(serde_json::Value::Null) => Ok(ConversationExt::default()),
            Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => {
                Ok(ConversationExt::default())
            }
            Some(serde_json::Value::String(raw)) => serde_json::from_str(raw),
            Some(value) => serde_json::from_value(value.clone()),
        }
    }

    /// Transcript as client messages, with non-decreasing timestamps.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::with_capacity(self.messages.len());
        for stored in &self.messages {
            let floor = messages.last().map(|m| m.timestamp);
            if let Some(message) = stored.to_message(floor) {
                messages.push(message);
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(value: serde_json::Value) -> ConversationDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_status_variants() {
        let d = detail(json!({"id": 1, "status": "archived"}));
        assert!(d.is_archived());
        let d = detail(json!({"id": 1, "status": "ARCHIVED"}));
        assert!(d.is_archived());
        let d = detail(json!({"id": 1, "status": "deleted"}));
        assert_eq!(d.status, ConversationStatus::Unknown);
        let d = detail(json!({"id": 1}));
        assert!(!d.is_archived());
    }

    #[test]
    fn test_ext_from_string_and_object() {
        let d = detail(json!({"id": 1, "extJson": "{\"knowledgeBaseIds\":[4,5]}"}));
        assert_eq!(d.ext().unwrap().knowledge_base_ids, vec![4, 5]);

        let d = detail(json!({"id": 1, "extJson": {"promptTemplateId": 2}}));
        let ext = d.ext().unwrap();
        assert!(ext.knowledge_base_ids.is_empty());
        assert_eq!(ext.prompt_template_id, Some(2));
    }

    #[test]
    fn test_ext_parse_failure() {
        let d = detail(json!({"id": 1, "extJson": "{not json"}));
        assert!(d.ext().is_err());
    }

    #[test]
    fn test_transcript_conversion() {
        let d = detail(json!({
            "id": "c-1",
            "messages": [
                {"type": "user", "content": "hi", "timestamp": "2026-01-01 10:00:00", "imageUrls": ["i"]},
                {"type": "assistant", "content": "hello", "reasoningContent": "r", "timestamp": "2026-01-01 09:00:00"},
                {"type": "system", "content": "ignored"},
                {"type": "ai", "content": null}
            ]
        }));

        let messages = d.to_messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_user());
        assert_eq!(messages[0].image_attachments(), vec!["i"]);
        assert_eq!(messages[1].reasoning_content, "r");
        // Out-of-order server timestamp is clamped to the previous one
        assert_eq!(messages[1].timestamp, messages[0].timestamp);
        assert!(messages[2].timestamp >= messages[1].timestamp);
        assert_eq!(messages[2].content, "");
    }
}
