//! Conversation directory: the paged, searchable conversation list.
//!
//! The session only needs the narrow [`ConversationDirectory`] seam; UIs use
//! the richer API here (search, grouping by date, pagination).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::ConversationSummary;
use crate::traits::ConversationDirectory;

/// Date bucket used by conversation sidebars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateGroup {
    Today,
    Yesterday,
    PreviousSevenDays,
    PreviousThirtyDays,
    Older,
}

impl DateGroup {
    pub const ALL: [DateGroup; 5] = [
        DateGroup::Today,
        DateGroup::Yesterday,
        DateGroup::PreviousSevenDays,
        DateGroup::PreviousThirtyDays,
        DateGroup::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DateGroup::Today => "Today",
            DateGroup::Yesterday => "Yesterday",
            DateGroup::PreviousSevenDays => "Previous 7 days",
            DateGroup::PreviousThirtyDays => "Previous 30 days",
            DateGroup::Older => "Older",
        }
    }

    /// Bucket for a timestamp relative to `now`, by calendar day.
    pub fn classify(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(at) = at else {
            return DateGroup::Older;
        };
        let days = (now.date_naive() - at.date_naive()).num_days();
        match days {
            i64::MIN..=0 => DateGroup::Today,
            1 => DateGroup::Yesterday,
            2..=7 => DateGroup::PreviousSevenDays,
            8..=30 => DateGroup::PreviousThirtyDays,
            _ => DateGroup::Older,
        }
    }
}

#[derive(Debug, Default)]
struct ListState {
    conversations: Vec<ConversationSummary>,
    /// Last page loaded; 0 before the first fetch
    page: u32,
    has_more: bool,
    total: u64,
    keyword: Option<String>,
    active: Option<String>,
    /// Bumped on every reset so a late append page is dropped
    generation: u64,
}

/// Conversation list backed by the REST API.
#[derive(Clone)]
pub struct Directory {
    api: ApiClient,
    page_size: u32,
    state: Arc<Mutex<ListState>>,
}

impl Directory {
    pub fn new(api: ApiClient) -> Self {
        let page_size = api.config().page_size.max(1);
        Self {
            api,
            page_size,
            state: Arc::new(Mutex::new(ListState {
                has_more: true,
                ..ListState::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the keyword filter and reload from the first page.
    pub async fn search(&self, keyword: &str) -> Result<(), ApiError> {
        {
            let mut state = self.lock();
            let keyword = keyword.trim();
            state.keyword = (!keyword.is_empty()).then(|| keyword.to_string());
        }
        self.load(true).await
    }

    pub fn keyword(&self) -> Option<String> {
        self.lock().keyword.clone()
    }

    /// Current snapshot, in server order.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.lock().conversations.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn total(&self) -> u64 {
        self.lock().total
    }

    pub fn active_conversation(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Snapshot bucketed by activity date; empty buckets are omitted and
    /// server order is kept inside each bucket.
    pub fn grouped(&self, now: DateTime<Utc>) -> Vec<(DateGroup, Vec<ConversationSummary>)> {
        let conversations = self.conversations();
        DateGroup::ALL
            .iter()
            .filter_map(|group| {
                let members: Vec<ConversationSummary> = conversations
                    .iter()
                    .filter(|c| DateGroup::classify(c.activity_at(), now) == *group)
                    .cloned()
                    .collect();
                (!members.is_empty()).then_some((*group, members))
            })
            .collect()
    }

    async fn load(&self, reset: bool) -> Result<(), ApiError> {
        let (page, keyword, generation) = {
            let mut state = self.lock();
            if reset {
                state.generation += 1;
                (1, state.keyword.clone(), state.generation)
            } else {
                if !state.has_more {
                    tracing::debug!("No more conversations to load");
                    return Ok(());
                }
                (state.page + 1, state.keyword.clone(), state.generation)
            }
        };

        let result = self
            .api
            .list_conversations(page, self.page_size, keyword.as_deref())
            .await?;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!("Dropping stale conversation page {}", page);
            return Ok(());
        }

        let received = result.records.len();
        if reset {
            state.conversations = result.records;
        } else {
            state.conversations.extend(result.records);
        }
        state.page = page;
        state.total = result.total;
        state.has_more = received as u32 >= self.page_size
            && (result.total == 0 || (state.conversations.len() as u64) < result.total);

        tracing::debug!(
            "Loaded {} conversations (page {}, total {})",
            received,
            page,
            result.total
        );
        Ok(())
    }
}

#[async_trait]
impl ConversationDirectory for Directory {
    async fn fetch_conversations(&self, reset: bool) -> Result<(), ApiError> {
        self.load(reset).await
    }

    fn latest_conversation_id(&self) -> Option<String> {
        let state = self.lock();
        state
            .conversations
            .iter()
            .enumerate()
            // Ties and missing timestamps fall back to list position (newest first)
            .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ib.cmp(ia)))
            .map(|(_, c)| c.id.clone())
    }

    fn set_active_conversation(&self, id: &str) {
        self.lock().active = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::config::ClientConfig;
    use crate::traits::Response;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn directory(page_size: u32) -> (Directory, MockHttpClient) {
        let http = MockHttpClient::new();
        let config = ClientConfig::new("http://test/api").with_page_size(page_size);
        let api = ApiClient::new(Arc::new(http.clone()), config);
        (Directory::new(api), http)
    }

    fn page(ids: &[(&str, &str)], total: u64) -> MockResponse {
        let records: Vec<_> = ids
            .iter()
            .map(|(id, created)| json!({"id": id, "title": id, "createdAt": created}))
            .collect();
        let body = json!({"records": records, "total": total});
        MockResponse::Success(Response::new(200, Bytes::from(body.to_string())))
    }

    #[tokio::test]
    async fn test_paging_and_exhaustion() {
        let (dir, http) = directory(2);
        http.set_default_response(page(&[], 3));
        http.push_response(
            "http://test/api/conversations?page=1&size=2",
            page(&[("a", "2026-01-03 00:00:00"), ("b", "2026-01-02 00:00:00")], 3),
        );
        http.push_response(
            "http://test/api/conversations?page=2&size=2",
            page(&[("c", "2026-01-01 00:00:00")], 3),
        );

        dir.fetch_conversations(true).await.unwrap();
        assert_eq!(dir.conversations().len(), 2);
        assert!(dir.has_more());

        dir.fetch_conversations(false).await.unwrap();
        assert_eq!(dir.conversations().len(), 3);
        assert!(!dir.has_more());

        // Exhausted: no request is made
        let before = http.get_requests().len();
        dir.fetch_conversations(false).await.unwrap();
        assert_eq!(http.get_requests().len(), before);
    }

    #[tokio::test]
    async fn test_search_resets_and_filters() {
        let (dir, http) = directory(20);
        http.set_default_response(page(&[("x", "2026-01-01 00:00:00")], 1));

        dir.search("  rust ").await.unwrap();
        assert_eq!(dir.keyword().as_deref(), Some("rust"));
        assert!(http.get_requests()[0].url.ends_with("keyword=rust"));

        dir.search("").await.unwrap();
        assert!(dir.keyword().is_none());
        assert!(!http.get_requests()[1].url.contains("keyword"));
    }

    #[tokio::test]
    async fn test_latest_conversation_id_uses_created_at() {
        let (dir, http) = directory(20);
        http.set_default_response(page(
            &[
                ("old", "2026-01-01 00:00:00"),
                ("new", "2026-03-01 00:00:00"),
                ("mid", "2026-02-01 00:00:00"),
            ],
            3,
        ));
        assert!(dir.latest_conversation_id().is_none());

        dir.fetch_conversations(true).await.unwrap();
        assert_eq!(dir.latest_conversation_id().as_deref(), Some("new"));

        dir.set_active_conversation("mid");
        assert_eq!(dir.active_conversation().as_deref(), Some("mid"));
    }

    #[test]
    fn test_classify_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let at = |d: i64| Some(now - Duration::days(d));
        assert_eq!(DateGroup::classify(at(0), now), DateGroup::Today);
        assert_eq!(DateGroup::classify(at(1), now), DateGroup::Yesterday);
        assert_eq!(DateGroup::classify(at(7), now), DateGroup::PreviousSevenDays);
        assert_eq!(DateGroup::classify(at(8), now), DateGroup::PreviousThirtyDays);
        assert_eq!(DateGroup::classify(at(31), now), DateGroup::Older);
        assert_eq!(DateGroup::classify(None, now), DateGroup::Older);
    }

    #[tokio::test]
    async fn test_grouped_omits_empty_buckets() {
        let (dir, http) = directory(20);
        http.set_default_response(page(
            &[
                ("t1", "2026-05-20 08:00:00"),
                ("o1", "2025-01-01 00:00:00"),
                ("t2", "2026-05-20 01:00:00"),
            ],
            3,
        ));
        dir.fetch_conversations(true).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let groups = dir.grouped(now);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, DateGroup::Today);
        let ids: Vec<_> = groups[0].1.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(groups[1].0.label(), "Older");
    }
}
