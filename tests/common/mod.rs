//! Common test utilities for integration tests.
//!
//! Fixtures for SSE bodies and conversation JSON, plus a harness that wires a
//! [`ChatSession`](kbchat::session::ChatSession) to in-memory doubles.
//!
//! # Example
//!
//! ```ignore
//! let harness = Harness::new();
//! harness.stream(&sse_body(&[("answer", "Hi")]));
//! harness.session.send_message("hello", vec![], None).unwrap().await.unwrap();
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use serde_json::{json, Value};

pub const BASE_URL: &str = "http://test.local/api";

pub fn chat_url() -> String {
    format!("{}/conversations/chat", BASE_URL)
}

/// One SSE frame, including its terminating blank line.
pub fn sse_frame(event: &str, data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

/// Frames followed by an explicit `done` frame.
pub fn sse_body(frames: &[(&str, &str)]) -> String {
    let mut body: String = frames
        .iter()
        .map(|(event, data)| sse_frame(event, data))
        .collect();
    body.push_str("event: done\ndata: \n\n");
    body
}

pub fn reference_json(document: &str, score: f64) -> Value {
    json!({
        "content": format!("excerpt from {}", document),
        "score": score,
        "documentId": 100,
        "documentName": document,
        "knowledgeBaseId": 7,
        "chunkIndex": 0
    })
}

pub fn conversation_detail_json(id: &str, status: &str, kb_ids: &[i64]) -> Value {
    json!({
        "id": id,
        "title": "Saved chat",
        "status": status,
        "extJson": json!({"knowledgeBaseIds": kb_ids}).to_string(),
        "messages": [
            {"type": "user", "content": "What is Rust?", "timestamp": "2026-03-01 09:00:00"},
            {"type": "assistant", "content": "A systems language.", "reasoningContent": "Easy one.", "timestamp": "2026-03-01 09:00:05"}
        ]
    })
}

pub fn conversation_page_json(ids: &[(&str, &str)], total: u64) -> Value {
    let records: Vec<Value> = ids
        .iter()
        .map(|(id, created)| {
            json!({"id": id, "title": format!("Chat {}", id), "createdAt": created, "updatedAt": created})
        })
        .collect();
    json!({"records": records, "total": total})
}
