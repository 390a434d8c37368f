use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use sparlo_core::{ChatRequest, StreamId};
use sparlo_logging::{sparlo_debug, sparlo_info, sparlo_warn};
use tokio_util::sync::CancellationToken;

use crate::client::{check_status, map_reqwest_error, HttpClient};
use crate::sse::{EventStreamDecoder, StreamEvent};
use crate::{ApiError, ChatEvent, EngineEvent, FailureKind};

pub const CHAT_PATH: [&str; 2] = ["api", "chat"];

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// How a chat stream ended when it ended without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOutcome {
    /// The server's persistence flag from the terminal event, if it sent one.
    pub saved: Option<bool>,
    pub chunks: usize,
}

#[async_trait::async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Streams one answer, emitting each text chunk through `sink` as it arrives.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires; nothing is emitted after that.
    async fn stream(
        &self,
        stream_id: StreamId,
        request: &ChatRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestChatStreamer {
    http: HttpClient,
}

impl ReqwestChatStreamer {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl ChatStreamer for ReqwestChatStreamer {
    async fn stream(
        &self,
        stream_id: StreamId,
        request: &ChatRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, ApiError> {
        let url = self.http.endpoint(&CHAT_PATH)?;
        let body = serde_json::to_vec(request)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        sparlo_debug!("Chat stream {} -> {}", stream_id, url);

        let send = self
            .http
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::cancelled()),
            response = send => response.map_err(map_reqwest_error)?,
        };
        let response = check_status(response).await?;

        let mut decoder = EventStreamDecoder::new(self.http.settings().max_line_bytes);
        let mut body = response.bytes_stream();
        let mut chunks = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                next = body.next() => next,
            };
            let finished = next.is_none();
            let events = match next {
                Some(chunk) => decoder.feed(&chunk.map_err(map_reqwest_error)?)?,
                None => decoder.finish(),
            };
            for event in events {
                match event {
                    StreamEvent::Text(text) => {
                        // A chunk can carry text after the user already cancelled.
                        if cancel.is_cancelled() {
                            return Err(ApiError::cancelled());
                        }
                        chunks += 1;
                        sink.emit(EngineEvent::Chat {
                            stream_id,
                            event: ChatEvent::Text(text),
                        });
                    }
                    StreamEvent::Done { saved } => {
                        if saved == Some(false) {
                            sparlo_warn!("Chat stream {} finished but was not saved", stream_id);
                        }
                        sparlo_info!("Chat stream {} done after {} chunks", stream_id, chunks);
                        return Ok(ChatOutcome { saved, chunks });
                    }
                    StreamEvent::Error(message) => {
                        return Err(ApiError::new(FailureKind::Upstream(message.clone()), message));
                    }
                }
            }
            if finished {
                sparlo_info!("Chat stream {} ended after {} chunks", stream_id, chunks);
                return Ok(ChatOutcome {
                    saved: None,
                    chunks,
                });
            }
        }
    }
}
