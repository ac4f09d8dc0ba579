//! kbchat - streaming chat session client for a knowledge-base assistant
//!
//! The core is [`session::ChatSession`], which sends a turn, streams the
//! assistant's answer over SSE and reconciles the conversation with the
//! server's conversation list once the turn completes.

pub mod adapters;
pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod session;
pub mod sse;
pub mod traits;
pub mod transport;
