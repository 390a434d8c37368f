//! Chat panel: one streamed answer at a time, cancellable, append-only history.

use serde::{Deserialize, Serialize};
use sparlo_logging::{sparlo_debug, sparlo_info};

use crate::notify::Notification;
use crate::Effect;

pub type StreamId = u64;

/// Keep following new output only when the reader is this close to the bottom.
pub const AUTO_SCROLL_THRESHOLD_PX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub is_streaming: bool,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl ChatMessage {
    fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            is_streaming: false,
            cancelled: false,
            error: None,
        }
    }

    fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            is_streaming: true,
            cancelled: false,
            error: None,
        }
    }
}

/// Body of a chat request, serialized as the endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Report {
        #[serde(rename = "reportId")]
        report_id: String,
        message: String,
    },
    Standalone {
        message: String,
        mode: String,
    },
}

impl ChatRequest {
    pub fn message(&self) -> &str {
        match self {
            ChatRequest::Report { message, .. } | ChatRequest::Standalone { message, .. } => {
                message
            }
        }
    }
}

/// What the panel is talking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatContext {
    Report { report_id: String },
    Standalone { mode: String },
}

impl Default for ChatContext {
    fn default() -> Self {
        ChatContext::Standalone {
            mode: "default".to_string(),
        }
    }
}

impl ChatContext {
    fn request(&self, message: String) -> ChatRequest {
        match self {
            ChatContext::Report { report_id } => ChatRequest::Report {
                report_id: report_id.clone(),
                message,
            },
            ChatContext::Standalone { mode } => ChatRequest::Standalone {
                message,
                mode: mode.clone(),
            },
        }
    }
}

/// Why a stream ended without a `done` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    RateLimited { retry_after_secs: Option<u64> },
    HttpStatus(u16),
    Network(String),
    Upstream(String),
    Cancelled,
}

impl ChatFailure {
    /// Text attached to the failed assistant message.
    pub fn user_message(&self) -> String {
        match self {
            ChatFailure::RateLimited {
                retry_after_secs: Some(secs),
            } => {
                let minutes = retry_after_minutes(*secs);
                let unit = if minutes == 1 { "minute" } else { "minutes" };
                format!("You've hit the chat rate limit. Please try again after {minutes} {unit}.")
            }
            ChatFailure::RateLimited {
                retry_after_secs: None,
            } => "You've hit the chat rate limit. Please try again later.".to_string(),
            ChatFailure::HttpStatus(code) => {
                format!("The chat request failed (HTTP {code}). Please try again.")
            }
            ChatFailure::Network(detail) => {
                format!("Connection to the chat service was lost: {detail}")
            }
            ChatFailure::Upstream(detail) => detail.clone(),
            ChatFailure::Cancelled => "Cancelled".to_string(),
        }
    }
}

/// Converts a `Retry-After` value in seconds to whole minutes, rounded up.
pub fn retry_after_minutes(secs: u64) -> u64 {
    secs.div_ceil(60).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMsg {
    InputChanged(String),
    /// User submitted the current input.
    Submitted,
    CancelClicked,
    /// The designated key: cancels an active stream, otherwise toggles the panel.
    EscapePressed,
    ToggleClicked,
    /// Message list scrolled; distance between the viewport bottom and content bottom.
    Scrolled { distance_from_bottom: f64 },
    StreamText { stream_id: StreamId, text: String },
    StreamDone { stream_id: StreamId, saved: Option<bool> },
    StreamFailed { stream_id: StreamId, failure: ChatFailure },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveStream {
    id: StreamId,
    message_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPanel {
    context: ChatContext,
    messages: Vec<ChatMessage>,
    input: String,
    active: Option<ActiveStream>,
    next_stream_id: StreamId,
    open: bool,
    pinned_to_bottom: bool,
    dirty: bool,
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new(ChatContext::default())
    }
}

impl ChatPanel {
    pub fn new(context: ChatContext) -> Self {
        Self {
            context,
            messages: Vec::new(),
            input: String::new(),
            active: None,
            next_stream_id: 1,
            open: false,
            pinned_to_bottom: true,
            dirty: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.active.map(|active| active.id)
    }

    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    /// Switches the report the panel talks about. An in-flight answer is cancelled.
    pub fn set_context(&mut self, context: ChatContext) -> Vec<Effect> {
        if self.context == context {
            return Vec::new();
        }
        let effects = self.cancel_active();
        self.context = context;
        self.messages.clear();
        self.dirty = true;
        effects
    }

    pub(crate) fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn update(&mut self, msg: ChatMsg) -> Vec<Effect> {
        match msg {
            ChatMsg::InputChanged(text) => {
                self.input = text;
                self.dirty = true;
                Vec::new()
            }
            ChatMsg::Submitted => self.submit(),
            ChatMsg::CancelClicked => self.cancel_active(),
            ChatMsg::EscapePressed => {
                if self.active.is_some() {
                    self.cancel_active()
                } else {
                    self.open = !self.open;
                    self.dirty = true;
                    Vec::new()
                }
            }
            ChatMsg::ToggleClicked => {
                self.open = !self.open;
                self.dirty = true;
                Vec::new()
            }
            ChatMsg::Scrolled {
                distance_from_bottom,
            } => {
                self.pinned_to_bottom = distance_from_bottom <= AUTO_SCROLL_THRESHOLD_PX;
                Vec::new()
            }
            ChatMsg::StreamText { stream_id, text } => {
                let Some(index) = self.live_message(stream_id) else {
                    sparlo_debug!("Dropping late chunk for stream {}", stream_id);
                    return Vec::new();
                };
                if text.is_empty() {
                    return Vec::new();
                }
                self.messages[index].content.push_str(&text);
                self.dirty = true;
                self.follow_output()
            }
            ChatMsg::StreamDone { stream_id, saved } => {
                let Some(index) = self.live_message(stream_id) else {
                    return Vec::new();
                };
                self.messages[index].is_streaming = false;
                self.active = None;
                self.dirty = true;
                let mut effects = Vec::new();
                if saved == Some(false) {
                    effects.push(Effect::Notify(Notification::warning(
                        "The answer was shown but could not be saved to this report's history.",
                    )));
                }
                effects.extend(self.follow_output());
                effects
            }
            ChatMsg::StreamFailed { stream_id, failure } => {
                let Some(index) = self.live_message(stream_id) else {
                    return Vec::new();
                };
                self.active = None;
                self.dirty = true;
                let message = &mut self.messages[index];
                message.is_streaming = false;
                if failure == ChatFailure::Cancelled {
                    message.cancelled = true;
                    return Vec::new();
                }
                let text = failure.user_message();
                message.error = Some(text.clone());
                let mut effects = vec![Effect::Notify(Notification::error(text))];
                effects.extend(self.follow_output());
                effects
            }
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return Vec::new();
        }
        if self.active.is_some() {
            sparlo_debug!("Rejected chat submit while stream {:?} is in flight", self.active);
            return Vec::new();
        }

        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;

        self.messages.push(ChatMessage::user(question.clone()));
        self.messages.push(ChatMessage::assistant_placeholder());
        self.active = Some(ActiveStream {
            id: stream_id,
            message_index: self.messages.len() - 1,
        });
        self.input.clear();
        self.open = true;
        self.dirty = true;

        let mut effects = vec![Effect::StartChatStream {
            stream_id,
            request: self.context.request(question),
        }];
        effects.extend(self.follow_output());
        effects
    }

    fn cancel_active(&mut self) -> Vec<Effect> {
        let Some(active) = self.active.take() else {
            return Vec::new();
        };
        if let Some(message) = self.messages.get_mut(active.message_index) {
            message.is_streaming = false;
            message.cancelled = true;
        }
        sparlo_info!("Chat stream {} cancelled by user", active.id);
        self.dirty = true;
        vec![Effect::CancelChatStream {
            stream_id: active.id,
        }]
    }

    /// Index of the message a chunk for `stream_id` may still mutate.
    fn live_message(&self, stream_id: StreamId) -> Option<usize> {
        self.active
            .filter(|active| active.id == stream_id)
            .map(|active| active.message_index)
    }

    fn follow_output(&self) -> Vec<Effect> {
        if self.pinned_to_bottom {
            vec![Effect::ScrollMessagesToBottom]
        } else {
            Vec::new()
        }
    }
}
