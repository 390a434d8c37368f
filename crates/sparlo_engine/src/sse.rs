//! Incremental decoder for the chat endpoint's `data: <json>` line stream.

use encoding_rs::{CoderResult, Decoder, UTF_8};
use serde::Deserialize;
use serde_json::Value;
use sparlo_logging::sparlo_debug;

use crate::{ApiError, FailureKind};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Text(String),
    Done { saved: Option<bool> },
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct WireEvent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    saved: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
}

impl WireEvent {
    fn into_events(self) -> Vec<StreamEvent> {
        if let Some(error) = self.error.filter(|value| !value.is_null()) {
            let message = match &error {
                Value::String(text) => text.clone(),
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| error.to_string()),
                other => other.to_string(),
            };
            return vec![StreamEvent::Error(message)];
        }

        let mut events = Vec::new();
        if let Some(text) = self.text.filter(|text| !text.is_empty()) {
            events.push(StreamEvent::Text(text));
        }
        if self.done {
            events.push(StreamEvent::Done { saved: self.saved });
        }
        events
    }
}

/// Turns arbitrarily split body chunks into stream events.
///
/// Multi-byte characters split across chunk boundaries are held back by the
/// UTF-8 decoder until the rest arrives. Lines are only parsed once their
/// terminating newline has been seen, or on [`EventStreamDecoder::finish`].
pub struct EventStreamDecoder {
    decoder: Decoder,
    pending: String,
    max_line_bytes: usize,
}

impl EventStreamDecoder {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            decoder: UTF_8.new_decoder_without_bom_handling(),
            pending: String::new(),
            max_line_bytes,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>, ApiError> {
        self.decode(bytes, false);
        let events = self.drain_lines();
        if self.pending.len() > self.max_line_bytes {
            return Err(ApiError::new(
                FailureKind::Decode,
                format!(
                    "stream line exceeds {} bytes without a newline",
                    self.max_line_bytes
                ),
            ));
        }
        Ok(events)
    }

    /// Flushes the decoder and parses a trailing line that lacked a newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.decode(&[], true);
        let mut events = self.drain_lines();
        let rest = std::mem::take(&mut self.pending);
        events.extend(parse_line(rest.trim_end_matches('\r')));
        events
    }

    fn decode(&mut self, bytes: &[u8], last: bool) {
        let mut consumed = 0;
        loop {
            let rest = &bytes[consumed..];
            let needed = self
                .decoder
                .max_utf8_buffer_length(rest.len())
                .unwrap_or(rest.len());
            self.pending.reserve(needed.max(4));
            let (result, read, had_errors) =
                self.decoder.decode_to_string(rest, &mut self.pending, last);
            if had_errors {
                sparlo_debug!("Replaced malformed UTF-8 in chat stream");
            }
            consumed += read;
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            events.extend(parse_line(line.trim_end_matches(['\n', '\r'])));
        }
        events
    }
}

fn parse_line(line: &str) -> Vec<StreamEvent> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Vec::new();
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Vec::new();
    }
    if payload == DONE_SENTINEL {
        return vec![StreamEvent::Done { saved: None }];
    }
    match serde_json::from_str::<WireEvent>(payload) {
        Ok(wire) => wire.into_events(),
        Err(err) => {
            sparlo_debug!("Skipping unparsable stream line: {}", err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(value: &str) -> StreamEvent {
        StreamEvent::Text(value.to_string())
    }

    #[test]
    fn parses_text_then_done() {
        let mut decoder = EventStreamDecoder::new(1024);
        let events = decoder
            .feed(b"data:{\"text\":\"Hel\"}\ndata: {\"text\":\"lo\"}\ndata:{\"done\":true}\n")
            .unwrap();
        assert_eq!(
            events,
            vec![text("Hel"), text("lo"), StreamEvent::Done { saved: None }]
        );
    }

    #[test]
    fn holds_partial_lines_and_split_characters() {
        let mut decoder = EventStreamDecoder::new(1024);
        let line = "data: {\"text\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.feed(&line[..split]).unwrap().is_empty());
        assert_eq!(decoder.feed(&line[split..]).unwrap(), vec![text("caf\u{e9}")]);
    }

    #[test]
    fn skips_noise_and_unparsable_lines() {
        let mut decoder = EventStreamDecoder::new(1024);
        let events = decoder
            .feed(b": keep-alive\nevent: message\ndata: {\"text\":\nretry: 10\r\ndata: {\"text\":\"ok\"}\r\n")
            .unwrap();
        assert_eq!(events, vec![text("ok")]);
    }

    #[test]
    fn error_payload_wins_over_text() {
        let mut decoder = EventStreamDecoder::new(1024);
        let events = decoder
            .feed(b"data: {\"text\":\"x\",\"error\":{\"message\":\"model overloaded\"}}\n")
            .unwrap();
        assert_eq!(events, vec![StreamEvent::Error("model overloaded".into())]);
    }

    #[test]
    fn done_carries_saved_flag() {
        let mut decoder = EventStreamDecoder::new(1024);
        let events = decoder
            .feed(b"data: {\"done\":true,\"saved\":false}\n")
            .unwrap();
        assert_eq!(events, vec![StreamEvent::Done { saved: Some(false) }]);
    }

    #[test]
    fn finish_parses_unterminated_tail() {
        let mut decoder = EventStreamDecoder::new(1024);
        assert!(decoder.feed(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Done { saved: None }]);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let mut decoder = EventStreamDecoder::new(16);
        let err = decoder.feed(&[b'a'; 32]).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }
}
