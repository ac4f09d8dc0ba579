//! Stream transport: one POST whose response body is an SSE stream.
//!
//! The transport reports through a [`StreamHandler`]. Per invocation exactly
//! one of `on_error` / `on_done` fires, exactly once, unless the
//! cancellation token is signalled, in which case neither fires.
//! Cancellation is checked at every suspension point: while the request is
//! in flight and between chunk reads.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::sse::{decode_stream, DecodeEvent};
use crate::traits::{Headers, HttpClient};

/// Callbacks driven by [`StreamTransport::run`].
pub trait StreamHandler: Send {
    /// A non-terminal frame, in arrival order.
    fn on_event(&mut self, event: &str, data: &str);

    /// The turn failed. Never called after a cancellation.
    fn on_error(&mut self, error: TransportError);

    /// The stream ended, with or without an explicit terminal frame.
    fn on_done(&mut self);
}

/// Which terminal path a run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `on_done` fired
    Completed,
    /// `on_error` fired
    Failed,
    /// Cancelled; no terminal callback fired
    Cancelled,
}

/// Drives one streaming request at a time over an injected [`HttpClient`].
#[derive(Clone)]
pub struct StreamTransport {
    http: Arc<dyn HttpClient>,
}

impl StreamTransport {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// POST `body` to `url` and feed the response frames to `handler`.
    pub async fn run<B, H>(
        &self,
        url: &str,
        body: &B,
        headers: &Headers,
        cancel: &CancellationToken,
        handler: &mut H,
    ) -> StreamOutcome
    where
        B: Serialize + ?Sized + Sync,
        H: StreamHandler,
    {
        if cancel.is_cancelled() {
            return StreamOutcome::Cancelled;
        }

        let payload = match serde_json::to_string(body) {
            Ok(payload) => payload,
            Err(e) => return fail(handler, TransportError::Encode(e.to_string())),
        };

        tracing::debug!("Opening stream to {}", url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            response = self.http.post_stream(url, &payload, headers) => response,
        };

        let response = match response {
            Ok(response) => response,
            // A request torn down by cancellation is not an error
            Err(_) if cancel.is_cancelled() => return StreamOutcome::Cancelled,
            Err(e) => return fail(handler, TransportError::Request(e)),
        };

        if !response.is_success() {
            return fail(
                handler,
                TransportError::Status {
                    status: response.status,
                    reason: response.reason,
                },
            );
        }

        let Some(body) = response.body else {
            return fail(handler, TransportError::MissingBody);
        };

        let frames = decode_stream(body);
        tokio::pin!(frames);

        let mut forwarded = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Stream cancelled after {} frames", forwarded);
                    return StreamOutcome::Cancelled;
                }
                next = frames.next() => next,
            };

            match next {
                Some(DecodeEvent::Frame(frame)) => {
                    if cancel.is_cancelled() {
                        return StreamOutcome::Cancelled;
                    }
                    forwarded += 1;
                    handler.on_event(&frame.event, &frame.data);
                }
                Some(DecodeEvent::Done) => {
                    tracing::debug!("Terminal frame after {} frames", forwarded);
                    handler.on_done();
                    return StreamOutcome::Completed;
                }
                None => {
                    tracing::debug!("Stream ended without terminal frame after {} frames", forwarded);
                    handler.on_done();
                    return StreamOutcome::Completed;
                }
                Some(DecodeEvent::Error(e)) => {
                    if cancel.is_cancelled() {
                        return StreamOutcome::Cancelled;
                    }
                    return fail(handler, TransportError::Read(e));
                }
            }
        }
    }
}

fn fail<H: StreamHandler>(handler: &mut H, error: TransportError) -> StreamOutcome {
    tracing::warn!(category = %error.category(), "Stream failed: {}", error);
    handler.on_error(error);
    StreamOutcome::Failed
}
