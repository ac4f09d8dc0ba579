//! REST client for the non-streaming endpoints.
//!
//! Covers the conversation list, the transcript read path, archive
//! toggling, text-to-speech and file upload. The chat stream itself goes
//! through [`crate::transport::StreamTransport`].

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    ArchiveRequest, ConversationDetail, ConversationPage, TtsRequest, TtsResponse, UploadRequest,
    UploadResponse,
};
use crate::traits::{HttpClient, HttpError, Response};

/// Client for the backend's JSON endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(http: Arc<dyn HttpClient>, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http)
    }

    /// `POST {base}/conversations/chat`, the stream endpoint.
    pub fn chat_url(&self) -> String {
        self.config.chat_url()
    }

    /// `GET {base}/conversations?page=&size=[&keyword=]`; pages start at 1.
    pub async fn list_conversations(
        &self,
        page: u32,
        size: u32,
        keyword: Option<&str>,
    ) -> Result<ConversationPage, ApiError> {
        let mut params = vec![("page", page.to_string()), ("size", size.to_string())];
        if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
            params.push(("keyword", keyword.to_string()));
        }
        let url = Url::parse_with_params(&self.config.url("conversations"), &params)
            .map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        tracing::debug!("Listing conversations page {} (size {})", page, size);
        let response = self.http.get(url.as_str(), &self.config.headers()).await?;
        decode(response, "conversation page")
    }

    /// `GET {base}/conversations/{id}`
    pub async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError> {
        let url = self.config.url(&format!("conversations/{}", id));
        let response = self.http.get(&url, &self.config.headers()).await?;
        decode(response, "conversation")
    }

    /// `POST {base}/conversations/{id}/archive`
    pub async fn set_archived(&self, id: &str, archived: bool) -> Result<(), ApiError> {
        let url = self.config.url(&format!("conversations/{}/archive", id));
        let response = self.post_json(&url, &ArchiveRequest { archived }).await?;
        check_status(&response)
    }

    /// `POST {base}/tts`; returns the URL of the synthesized audio.
    pub async fn text_to_speech(&self, text: &str) -> Result<String, ApiError> {
        let url = self.config.url("tts");
        let body = TtsRequest {
            text: text.to_string(),
        };
        let response = self.post_json(&url, &body).await?;
        let tts: TtsResponse = decode(response, "tts response")?;
        Ok(tts.url)
    }

    /// `POST {base}/files/upload`; returns the hosted URL.
    pub async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, ApiError> {
        let url = self.config.url("files/upload");
        let body = UploadRequest {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            data: BASE64.encode(data),
        };
        tracing::debug!("Uploading {} ({} bytes)", file_name, data.len());
        let response = self.post_json(&url, &body).await?;
        let upload: UploadResponse = decode(response, "upload response")?;
        Ok(upload.url)
    }

    async fn post_json<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<Response, ApiError> {
        let payload = serde_json::to_string(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self.http.post(url, &payload, &self.config.headers()).await?)
    }
}

fn check_status(response: &Response) -> Result<(), ApiError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status {
            status: response.status,
            message: response.text(),
        })
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T, ApiError> {
    check_status(&response)?;
    response.json().map_err(|e| ApiError::decode(what, e))
}
