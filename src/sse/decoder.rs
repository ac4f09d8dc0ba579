//! Incremental frame decoder
//!
//! Bytes are buffered until a blank line (`\n\n` or `\r\n\r\n`) is seen, so chunk boundaries
//! (including ones that split a multi-byte UTF-8 sequence) never lose or
//! duplicate data. Once the terminal frame is decoded the decoder is finished
//! and ignores any further input.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};

use super::events::{Decoded, SseFrame, SseLine, DEFAULT_EVENT};

/// Classify a single SSE line.
///
/// `event:` names are trimmed. For `data:` only the single optional space
/// after the colon is removed; the rest of the payload is kept verbatim
/// because answer tokens routinely begin or end with whitespace.
pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        return SseLine::Data(rest.to_string());
    }

    SseLine::Comment(line.to_string())
}

/// Parse the text of one complete frame (without its trailing blank line).
///
/// Returns `None` for frames that carry nothing: blank, whitespace-only or
/// comment-only frames.
pub fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event: Option<String> = None;
    let mut data = String::new();
    let mut has_data = false;

    for line in text.split('\n') {
        match parse_sse_line(line) {
            SseLine::Event(name) => event = Some(name),
            SseLine::Data(chunk) => {
                data.push_str(&chunk);
                has_data = true;
            }
            SseLine::Comment(_) | SseLine::Empty => {}
        }
    }

    if event.is_none() && !has_data {
        return None;
    }

    Some(SseFrame {
        event: event
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
    })
}

/// Stateful decoder turning byte chunks into frames.
///
/// One decoder per stream; it is not restartable.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal frame has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a frame boundary.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// If the chunk completes the terminal frame, the returned vector ends
    /// with [`Decoded::Done`] and everything after it is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(decoded) = self.next_frame() {
            let done = decoded == Decoded::Done;
            out.push(decoded);
            if done {
                break;
            }
        }

        out
    }

    /// Pop the next complete, non-blank frame out of the buffer.
    fn next_frame(&mut self) -> Option<Decoded> {
        loop {
            let (pos, len) = find_boundary(&self.buffer)?;
            let raw: Vec<u8> = self.buffer.drain(..pos + len).collect();
            let text = String::from_utf8_lossy(&raw[..pos]);

            let Some(frame) = parse_frame(&text) else {
                continue;
            };

            if frame.is_terminal() {
                self.finished = true;
                self.buffer.clear();
                return Some(Decoded::Done);
            }

            return Some(Decoded::Frame(frame));
        }
    }
}

/// Offset of the first blank line and the length of the separator there.
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    buffer.iter().enumerate().find_map(|(i, &byte)| {
        if byte != b'\n' {
            return None;
        }
        match &buffer[i + 1..] {
            [b'\n', ..] => Some((i, 2)),
            [b'\r', b'\n', ..] => Some((i, 3)),
            _ => None,
        }
    })
}

/// Item yielded by [`decode_stream`].
#[derive(Debug)]
pub enum DecodeEvent<E> {
    Frame(SseFrame),
    /// The terminal frame arrived; the stream yields nothing after this.
    Done,
    /// The underlying byte stream failed.
    Error(E),
}

/// Lazily decode a byte stream into frames.
///
/// The returned stream ends right after yielding [`DecodeEvent::Done`] or
/// [`DecodeEvent::Error`], or when the byte stream itself ends. A natural
/// end without a terminal frame simply ends the stream; whatever partial
/// frame is still buffered at that point is dropped.
pub fn decode_stream<S, E>(bytes_stream: S) -> impl Stream<Item = DecodeEvent<E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let queue: std::collections::VecDeque<Decoded> = std::collections::VecDeque::new();

    stream::unfold(
        Some((bytes_stream, FrameDecoder::new(), queue)),
        |state| async move {
            let (mut bytes_stream, mut decoder, mut queue) = state?;
            loop {
                if let Some(decoded) = queue.pop_front() {
                    return match decoded {
                        Decoded::Frame(frame) => Some((
                            DecodeEvent::Frame(frame),
                            Some((bytes_stream, decoder, queue)),
                        )),
                        Decoded::Done => Some((DecodeEvent::Done, None)),
                    };
                }

                match bytes_stream.next().await {
                    Some(Ok(chunk)) => queue.extend(decoder.feed(&chunk)),
                    Some(Err(e)) => return Some((DecodeEvent::Error(e), None)),
                    None => return None,
                }
            }
        },
    )
}
