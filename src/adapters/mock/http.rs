//! Mock HTTP client for testing.
//!
//! Returns scripted responses per URL and records every request so tests can
//! assert on what was sent. Streaming responses can be fixed chunk lists,
//! streams that never end, or channels the test feeds while the turn runs.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response, StreamResponse};

type ChunkReceiver = mpsc::UnboundedReceiver<Result<Bytes, HttpError>>;

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_str(body).ok())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Buffered response for `get` / `post`
    Success(Response),
    /// Fail before any response arrives
    Error(HttpError),
    /// 200 stream yielding these chunks, then ending
    Stream(Vec<Bytes>),
    /// 200 stream yielding these chunks, then failing
    StreamThenError(Vec<Bytes>, HttpError),
    /// 200 stream yielding these chunks, then never ending
    StreamThenPending(Vec<Bytes>),
    /// 200 stream driven by a channel created with [`MockHttpClient::stream_channel`]
    Channel(Arc<Mutex<Option<ChunkReceiver>>>),
    /// Non-2xx streaming response
    Status { status: u16, reason: String },
    /// 200 streaming response without a body
    NoBody,
    /// Never answers
    Pending,
}

/// Mock HTTP client for testing.
///
/// Responses are looked up per URL: first a queue of one-shot responses
/// ([`MockHttpClient::push_response`]), then a sticky response
/// ([`MockHttpClient::set_response`], exact or prefix match), then the
/// default.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a sticky response for a URL (exact or prefix match).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Queue a response that is used once, ahead of any sticky response.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut queued = self.queued.lock().unwrap();
        queued.entry(url.to_string()).or_default().push_back(response);
    }

    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    /// Queue a streaming response whose chunks are pushed by the test.
    ///
    /// Dropping the returned sender ends the stream.
    pub fn stream_channel(&self, url: &str) -> mpsc::UnboundedSender<Result<Bytes, HttpError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_response(url, MockResponse::Channel(Arc::new(Mutex::new(Some(rx)))));
        tx
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.get_requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        {
            let mut queued = self.queued.lock().unwrap();
            if let Some(response) = queued.get_mut(url).and_then(|q| q.pop_front()) {
                return Some(response);
            }
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        // Longest prefix wins so `/conversations/chat` beats `/conversations`
        let prefix_match = responses
            .iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone());
        if prefix_match.is_some() {
            return prefix_match;
        }

        self.default_response.lock().unwrap().clone()
    }

    async fn buffered(&self, url: &str) -> Result<Response, HttpError> {
        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Pending) => future::pending::<Result<Response, HttpError>>().await,
            Some(_) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

fn chunk_stream(chunks: Vec<Bytes>) -> impl futures::Stream<Item = Result<Bytes, HttpError>> {
    stream::iter(chunks.into_iter().map(Ok))
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.buffered(url).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.buffered(url).await
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<StreamResponse, HttpError> {
        use futures::StreamExt;

        self.record_request("POST", url, headers, Some(body.to_string()));

        let body: ByteStream = match self.get_response(url) {
            Some(MockResponse::Stream(chunks)) => Box::pin(chunk_stream(chunks)),
            Some(MockResponse::StreamThenError(chunks, err)) => {
                Box::pin(chunk_stream(chunks).chain(stream::once(async move { Err(err) })))
            }
            Some(MockResponse::StreamThenPending(chunks)) => {
                Box::pin(chunk_stream(chunks).chain(stream::pending()))
            }
            Some(MockResponse::Channel(slot)) => {
                let rx = slot
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| HttpError::Other("Stream channel already used".to_string()))?;
                Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                }))
            }
            Some(MockResponse::Status { status, reason }) => {
                let body: ByteStream = Box::pin(chunk_stream(vec![Bytes::from("error body")]));
                return Ok(StreamResponse::new(status, reason, Some(body)));
            }
            Some(MockResponse::NoBody) => return Ok(StreamResponse::new(200, "OK", None)),
            Some(MockResponse::Pending) => {
                return future::pending::<Result<StreamResponse, HttpError>>().await
            }
            Some(MockResponse::Error(err)) => return Err(err),
            Some(MockResponse::Success(_)) => {
                return Err(HttpError::Other(
                    "Non-stream response on stream request".to_string(),
                ))
            }
            None => return Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        };

        Ok(StreamResponse::new(200, "OK", Some(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(response: StreamResponse) -> Vec<Result<Bytes, HttpError>> {
        response.body.unwrap().collect().await
    }

    #[tokio::test]
    async fn test_get_with_response() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/test",
            MockResponse::Success(Response::new(200, Bytes::from("Hello"))),
        );

        let response = client
            .get("https://example.com/test", &Headers::new())
            .await
            .unwrap();

        assert_eq!(response.body, Bytes::from("Hello"));
        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
    }

    #[tokio::test]
    async fn test_post_stream_with_chunks() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/stream",
            MockResponse::Stream(vec![Bytes::from("a"), Bytes::from("b")]),
        );

        let response = client
            .post_stream("https://example.com/stream", "{}", &Headers::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let chunks = collect(response).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].as_ref().unwrap(), &Bytes::from("b"));
    }

    #[tokio::test]
    async fn test_stream_then_error() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/stream",
            MockResponse::StreamThenError(vec![Bytes::from("a")], HttpError::Io("reset".to_string())),
        );

        let response = client
            .post_stream("https://example.com/stream", "{}", &Headers::new())
            .await
            .unwrap();
        let chunks = collect(response).await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_err());
    }

    #[tokio::test]
    async fn test_queued_responses_used_once() {
        let client = MockHttpClient::new();
        client.push_response("https://example.com/s", MockResponse::NoBody);
        client.set_response(
            "https://example.com/s",
            MockResponse::Status {
                status: 500,
                reason: "Internal Server Error".to_string(),
            },
        );

        let first = client
            .post_stream("https://example.com/s", "{}", &Headers::new())
            .await
            .unwrap();
        assert!(first.body.is_none());

        let second = client
            .post_stream("https://example.com/s", "{}", &Headers::new())
            .await
            .unwrap();
        assert_eq!(second.status, 500);
    }

    #[tokio::test]
    async fn test_stream_channel() {
        let client = MockHttpClient::new();
        let tx = client.stream_channel("https://example.com/s");

        let response = client
            .post_stream("https://example.com/s", "{}", &Headers::new())
            .await
            .unwrap();

        tx.send(Ok(Bytes::from("x"))).unwrap();
        drop(tx);

        let chunks = collect(response).await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_longest_prefix_match() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/conversations",
            MockResponse::Success(Response::new(200, Bytes::from("list"))),
        );
        client.set_response(
            "https://example.com/conversations/abc",
            MockResponse::Success(Response::new(200, Bytes::from("detail"))),
        );

        let response = client
            .get("https://example.com/conversations/abc?x=1", &Headers::new())
            .await
            .unwrap();
        assert_eq!(response.body, Bytes::from("detail"));
    }

    #[tokio::test]
    async fn test_no_response_configured() {
        let client = MockHttpClient::new();
        let result = client.get("https://example.com/missing", &Headers::new()).await;
        assert!(matches!(result, Err(HttpError::Other(_))));
    }

    #[test]
    fn test_recorded_request_json() {
        let client = MockHttpClient::new();
        client.record_request("POST", "u", &Headers::new(), Some(r#"{"a":1}"#.to_string()));
        let json = client.get_requests()[0].json().unwrap();
        assert_eq!(json["a"], 1);
    }
}
