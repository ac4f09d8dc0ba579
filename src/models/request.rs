use serde::{Deserialize, Serialize};

/// Body of `POST /conversations/chat`.
///
/// Absent fields are omitted entirely; in particular a missing
/// `conversationId` tells the backend to create a new conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_base_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template_id: Option<i64>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: (!message.is_empty()).then_some(message),
            ..Self::default()
        }
    }

    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_model(mut self, model_id: Option<i64>) -> Self {
        self.model_id = model_id;
        self
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    pub fn with_audio(mut self, audio_url: Option<String>) -> Self {
        self.audio_url = audio_url.filter(|url| !url.is_empty());
        self
    }

    pub fn with_knowledge_bases(mut self, ids: Vec<i64>) -> Self {
        self.knowledge_base_ids = ids;
        self
    }

    pub fn with_prompt_template(mut self, id: Option<i64>) -> Self {
        self.prompt_template_id = id;
        self
    }
}

/// Body of `POST /conversations/{id}/archive`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveRequest {
    pub archived: bool,
}

/// Body of `POST /tts`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtsRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtsResponse {
    pub url: String,
}

/// Body of `POST /files/upload`; `data` is base64
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_request_omits_optional_fields() {
        let value = serde_json::to_value(ChatRequest::new("hi")).unwrap();
        assert_eq!(value, json!({"message": "hi"}));
    }

    #[test]
    fn test_full_request_uses_camel_case() {
        let request = ChatRequest::new("hi")
            .with_conversation(Some("c-1".to_string()))
            .with_model(Some(3))
            .with_images(vec!["https://img/1.png".to_string()])
            .with_audio(Some("https://a/1.mp3".to_string()))
            .with_knowledge_bases(vec![1, 2])
            .with_prompt_template(Some(9));

        let value = serde_json::to_value(request).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "hi",
                "modelId": 3,
                "conversationId": "c-1",
                "imageUrls": ["https://img/1.png"],
                "audioUrl": "https://a/1.mp3",
                "knowledgeBaseIds": [1, 2],
                "promptTemplateId": 9
            })
        );
    }

    #[test]
    fn test_empty_message_and_audio_omitted() {
        let request = ChatRequest::new("")
            .with_images(vec!["u".to_string()])
            .with_audio(Some(String::new()));
        let value = serde_json::to_value(request).unwrap();
        assert_eq!(value, json!({"imageUrls": ["u"]}));
    }
}
