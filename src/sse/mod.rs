//! SSE (Server-Sent Events) frame decoding
//!
//! Decodes the chat stream's wire format:
//! - `event: <name>` - event name line (defaults to `message`)
//! - `data: <payload>` - payload line(s), concatenated without separator
//! - Blank line - ends the frame
//! - Lines starting with `:` - comments (ignored)
//!
//! A frame named `done`, or one whose payload is exactly `[DONE]`, ends the
//! stream.
//!
//! # Module structure
//! - `events` - Frame types (SseFrame, Decoded, SseLine)
//! - `decoder` - Decoding logic (FrameDecoder, parse_sse_line, decode_stream)

mod decoder;
mod events;

pub use decoder::{decode_stream, parse_frame, parse_sse_line, DecodeEvent, FrameDecoder};
pub use events::{Decoded, SseFrame, SseLine, DEFAULT_EVENT, DONE_EVENT, DONE_PAYLOAD};
