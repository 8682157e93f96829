//! Server-sent event framing for the insight relay.
//!
//! Frames on the wire are exactly `data: <payload>\n\n` where the payload is
//! `{"content": "..."}`, the `[DONE]` sentinel, or the `{"error": "..."}`
//! extension frame sent right before an aborted stream.

use serde::{Deserialize, Serialize};

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentFrame {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorFrame {
    pub error: String,
}

/// A decoded `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Content(String),
    Done,
    Error(String),
    /// Payload that is neither JSON of a known shape nor the sentinel.
    Malformed(String),
}

/// Payload of a content frame (without the `data: ` prefix).
pub fn content_payload(text: &str) -> String {
    json_payload(&ContentFrame {
        content: text.to_string(),
    })
}

pub fn error_payload(message: &str) -> String {
    json_payload(&ErrorFrame {
        error: message.to_string(),
    })
}

fn json_payload<T: Serialize>(frame: &T) -> String {
    // Structs of plain strings always serialize.
    serde_json::to_string(frame).unwrap_or_default()
}

pub fn encode_content(text: &str) -> String {
    format!("{DATA_PREFIX}{}\n\n", content_payload(text))
}

pub fn encode_done() -> String {
    format!("{DATA_PREFIX}{DONE_SENTINEL}\n\n")
}

pub fn encode_error(message: &str) -> String {
    format!("{DATA_PREFIX}{}\n\n", error_payload(message))
}

/// Classify one line of an event stream. Returns `None` for anything that is
/// not a `data:` line (blank separators, comments, other fields).
pub fn parse_data_line(line: &str) -> Option<RelayFrame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        return Some(RelayFrame::Done);
    }

    #[derive(Deserialize)]
    struct Wire {
        content: Option<String>,
        error: Option<String>,
    }

    let frame = match serde_json::from_str::<Wire>(payload) {
        Ok(Wire {
            content: Some(content),
            ..
        }) => RelayFrame::Content(content),
        Ok(Wire {
            error: Some(error), ..
        }) => RelayFrame::Error(error),
        _ => RelayFrame::Malformed(payload.to_string()),
    };
    Some(frame)
}

/// Splits an arbitrarily chunked byte stream into lines.
///
/// Bytes after the last `\n` are carried over to the next `push`, so a line
/// (or a multi-byte character) split across reads is only decoded once it is
/// complete.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Unterminated trailing text left when the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_exact_wire_form() {
        assert_eq!(encode_content("高"), "data: {\"content\":\"高\"}\n\n");
        assert_eq!(encode_done(), "data: [DONE]\n\n");
        assert_eq!(encode_error("boom"), "data: {\"error\":\"boom\"}\n\n");
        assert_eq!(
            encode_content("a\nb\"c"),
            "data: {\"content\":\"a\\nb\\\"c\"}\n\n"
        );
    }

    #[test]
    fn parses_data_lines() {
        assert_eq!(
            parse_data_line(r#"data: {"content":"风险"}"#),
            Some(RelayFrame::Content("风险".into()))
        );
        assert_eq!(parse_data_line("data: [DONE]"), Some(RelayFrame::Done));
        assert_eq!(
            parse_data_line(r#"data: {"error":"upstream"}"#),
            Some(RelayFrame::Error("upstream".into()))
        );
        assert_eq!(
            parse_data_line("data: {not json"),
            Some(RelayFrame::Malformed("{not json".into()))
        );
        assert_eq!(
            parse_data_line(r#"data: {"other":1}"#),
            Some(RelayFrame::Malformed(r#"{"other":1}"#.into()))
        );
        assert_eq!(parse_data_line(""), None);
        assert_eq!(parse_data_line(": keep-alive"), None);
        assert_eq!(parse_data_line("event: message"), None);
    }

    #[test]
    fn decoder_carries_partial_lines_across_reads() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"cont").is_empty());
        assert!(decoder.has_pending());
        let lines = decoder.push(b"ent\":\"x\"}\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"content\":\"x\"}".to_string(), String::new()]);
        let lines = decoder.push(b"NE]\n\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string(), String::new()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_between_reads() {
        let frame = encode_content("风险");
        let bytes = frame.as_bytes();
        // Split inside the first character of the payload.
        let cut = frame.find('风').unwrap() + 1;
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let lines = decoder.push(&bytes[cut..]);
        assert_eq!(
            parse_data_line(&lines[0]),
            Some(RelayFrame::Content("风险".into()))
        );
    }

    #[test]
    fn decoder_strips_carriage_returns_and_reports_trailing_text() {
        let mut decoder = SseLineDecoder::new();
        let lines = decoder.push(b"data: [DONE]\r\n\r\ntrailing");
        assert_eq!(lines, vec!["data: [DONE]".to_string(), String::new()]);
        assert_eq!(decoder.finish().as_deref(), Some("trailing"));
        assert!(!decoder.has_pending());
    }
}
