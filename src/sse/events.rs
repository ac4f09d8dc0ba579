//! SSE frame types
//!
//! A frame is the unit delimited by a blank line on the wire. The decoder
//! only deals in raw `(event, data)` pairs; interpreting the payload of a
//! given event name is the session's job.

/// Event name used when a frame carries no `event:` line.
pub const DEFAULT_EVENT: &str = "message";

/// Event name that terminates the stream.
pub const DONE_EVENT: &str = "done";

/// Payload that terminates the stream regardless of event name.
pub const DONE_PAYLOAD: &str = "[DONE]";

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`reasoning`, `answer`, `image`, `references`, ...)
    pub event: String,
    /// Concatenated payload of every `data:` line in the frame
    pub data: String,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.event == DONE_EVENT || self.data == DONE_PAYLOAD
    }
}

/// Result of decoding one complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A regular frame to forward to the consumer
    Frame(SseFrame),
    /// The terminal frame; nothing after it is parsed
    Done,
}

/// Classification of a single line inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `event: <name>`
    Event(String),
    /// `data: <payload>`
    Data(String),
    /// `: comment`, or any field this client does not use (`id:`, `retry:`)
    Comment(String),
    /// Blank line
    Empty,
}
