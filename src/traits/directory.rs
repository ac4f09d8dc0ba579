//! Conversation directory seam.
//!
//! The session never owns the conversation list. After a turn completes it
//! asks the directory to refresh and, for a brand-new conversation, reads
//! back the id the backend allocated.

use async_trait::async_trait;

use crate::error::ApiError;

#[async_trait]
pub trait ConversationDirectory: Send + Sync {
    /// Reload the first page (`reset = true`) or append the next one.
    async fn fetch_conversations(&self, reset: bool) -> Result<(), ApiError>;

    /// Id of the most recently created conversation in the current snapshot.
    fn latest_conversation_id(&self) -> Option<String>;

    /// Mark a conversation as the one being viewed.
    fn set_active_conversation(&self, id: &str);
}
