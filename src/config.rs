//! Client configuration.
//!
//! Values are layered: built-in defaults, then `~/.kbchat/config.json` when
//! present, then `KBCHAT_*` environment variables.
//!
//! ```ignore
//! use kbchat::config::ClientConfig;
//!
//! let config = ClientConfig::load()?
//!     .with_refresh_delay(std::time::Duration::from_millis(800));
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::traits::Headers;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";

pub const ENV_BASE_URL: &str = "KBCHAT_BASE_URL";
pub const ENV_TOKEN: &str = "KBCHAT_TOKEN";
pub const ENV_AUTH_HEADER: &str = "KBCHAT_AUTH_HEADER";
pub const ENV_REFRESH_DELAY_MS: &str = "KBCHAT_REFRESH_DELAY_MS";
pub const ENV_MODEL_ID: &str = "KBCHAT_MODEL_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

impl ConfigError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// On-disk shape; every field optional so a file can override just one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    base_url: Option<String>,
    auth_header: Option<String>,
    auth_token: Option<String>,
    refresh_delay_ms: Option<u64>,
    page_size: Option<u32>,
    model_id: Option<i64>,
}

/// Settings shared by the session, directory and API client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root, without trailing slash (e.g. `https://host/api`)
    pub base_url: String,
    /// Header that carries the auth token
    pub auth_header: String,
    /// Token sent verbatim in `auth_header`; no header when `None`
    pub auth_token: Option<String>,
    /// Grace period between a finished turn and the directory refresh
    pub refresh_delay: Duration,
    /// Conversations per directory page
    pub page_size: u32,
    /// Model used for new turns unless the session overrides it
    pub model_id: Option<i64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            auth_token: None,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            model_id: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Defaults, then the user config file, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = default_config_path() {
            if path.exists() {
                config = config.merge_file(&path)?;
            }
        }
        config.merge_env()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn with_model_id(mut self, model_id: Option<i64>) -> Self {
        self.model_id = model_id;
        self
    }

    /// Overlay values from a JSON config file.
    pub fn merge_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base_url) = file.base_url {
            self = self.with_base_url(base_url);
        }
        if let Some(header) = file.auth_header {
            self.auth_header = header;
        }
        if file.auth_token.is_some() {
            self.auth_token = file.auth_token;
        }
        if let Some(ms) = file.refresh_delay_ms {
            self.refresh_delay = Duration::from_millis(ms);
        }
        if let Some(size) = file.page_size {
            self = self.with_page_size(size);
        }
        if file.model_id.is_some() {
            self.model_id = file.model_id;
        }

        tracing::debug!("Loaded config from {}", path.display());
        Ok(self)
    }

    /// Overlay values from `KBCHAT_*` environment variables.
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            self = self.with_base_url(base_url);
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                self.auth_token = Some(token);
            }
        }
        if let Ok(header) = std::env::var(ENV_AUTH_HEADER) {
            self.auth_header = header;
        }
        if let Ok(value) = std::env::var(ENV_REFRESH_DELAY_MS) {
            let ms: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_REFRESH_DELAY_MS,
                value: value.clone(),
            })?;
            self.refresh_delay = Duration::from_millis(ms);
        }
        if let Ok(value) = std::env::var(ENV_MODEL_ID) {
            let id: i64 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_MODEL_ID,
                value: value.clone(),
            })?;
            self.model_id = Some(id);
        }
        Ok(self)
    }

    /// Join a path onto the API root.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// The chat stream endpoint.
    pub fn chat_url(&self) -> String {
        self.url("conversations/chat")
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        if let Some(token) = self.auth_token.as_deref().filter(|t| !t.is_empty()) {
            headers.insert(self.auth_header.clone(), token.to_string());
        }
        headers
    }
}

/// `~/.kbchat/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kbchat").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            ENV_BASE_URL,
            ENV_TOKEN,
            ENV_AUTH_HEADER,
            ENV_REFRESH_DELAY_MS,
            ENV_MODEL_ID,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.refresh_delay, DEFAULT_REFRESH_DELAY);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_headers_without_token() {
        let headers = ClientConfig::default().headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type").unwrap(), CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_headers_with_custom_auth_header() {
        let headers = ClientConfig::default()
            .with_auth_header("X-Access-Token")
            .with_auth_token("abc")
            .headers();
        assert_eq!(headers.get("X-Access-Token").map(String::as_str), Some("abc"));
        assert!(!headers.contains_key("Authorization"));
    }

    #[test]
    fn test_urls_strip_slashes() {
        let config = ClientConfig::new("https://host/api/");
        assert_eq!(config.chat_url(), "https://host/api/conversations/chat");
        assert_eq!(config.url("/tts"), "https://host/api/tts");
    }

    #[test]
    fn test_merge_file_overrides_some_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"baseUrl":"https://kb.example/api","refreshDelayMs":250,"authToken":"t"}"#,
        )
        .unwrap();

        let config = ClientConfig::default().merge_file(&path).unwrap();
        assert_eq!(config.base_url, "https://kb.example/api");
        assert_eq!(config.refresh_delay, Duration::from_millis(250));
        assert_eq!(config.auth_token.as_deref(), Some("t"));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_merge_file_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = ClientConfig::default().merge_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    #[serial]
    fn test_merge_env() {
        clear_env();
        std::env::set_var(ENV_BASE_URL, "http://env-host/api");
        std::env::set_var(ENV_TOKEN, "env-token");
        std::env::set_var(ENV_REFRESH_DELAY_MS, "10");
        std::env::set_var(ENV_MODEL_ID, "7");

        let config = ClientConfig::default().merge_env().unwrap();
        clear_env();

        assert_eq!(config.base_url, "http://env-host/api");
        assert_eq!(config.auth_token.as_deref(), Some("env-token"));
        assert_eq!(config.refresh_delay, Duration::from_millis(10));
        assert_eq!(config.model_id, Some(7));
    }

    #[test]
    #[serial]
    fn test_merge_env_invalid_delay() {
        clear_env();
        std::env::set_var(ENV_REFRESH_DELAY_MS, "soon");

        let result = ClientConfig::default().merge_env();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: ENV_REFRESH_DELAY_MS, .. })
        ));
        let err = result.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.category().is_retryable());
    }
}
