// SPDX-License-Identifier: MIT

//! `stream-json` event envelope emitted by the agent CLI, one JSON object
//! per stdout line (§6 "Agent CLI contract").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parsed line of agent-CLI stdout.
///
/// Unrecognized `type` values deserialize into [`StreamEvent::Other`] rather
/// than failing, since the driver only needs to react to the three
/// recognized kinds and must tolerate future/unknown ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Assistant { message: AssistantMessage },
    ContentBlockDelta { delta: Delta },
    Result(ResultEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEvent {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// Text extracted from a single stream event, per §4.3's extraction rules.
/// `None` for event kinds that carry no user-visible text (e.g. `Other`).
pub type TextExtraction = Option<String>;

impl StreamEvent {
    /// Parse a single non-empty stdout line. Returns `None` if the line is
    /// not a JSON object — the caller treats that as opaque text instead
    /// (§9 "stream parser ambiguity": never attempt to recover fragments).
    pub fn parse_line(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Extract display text per §4.3: concatenated text blocks for
    /// `assistant`, the delta text for `content_block_delta`, the `result`
    /// field for `result`. Other kinds yield no text.
    pub fn extract_text(&self) -> TextExtraction {
        match self {
            StreamEvent::Assistant { message } => {
                let joined: String = message
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        ContentBlock::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join("");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            StreamEvent::ContentBlockDelta { delta } => delta.text.clone(),
            StreamEvent::Result(r) => Some(r.result.clone()),
            StreamEvent::Other => None,
        }
    }

    /// True iff this is a terminal `result` event reporting an error.
    pub fn is_error_result(&self) -> bool {
        matches!(self, StreamEvent::Result(r) if r.is_error)
    }

    pub fn as_result(&self) -> Option<&ResultEvent> {
        match self {
            StreamEvent::Result(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assistant_event_and_joins_text_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello "},{"type":"text","text":"world"}]}}"#;
        let ev = StreamEvent::parse_line(line).unwrap();
        assert_eq!(ev.extract_text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn parses_content_block_delta() {
        let line = r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"chunk"}}"#;
        let ev = StreamEvent::parse_line(line).unwrap();
        assert_eq!(ev.extract_text().as_deref(), Some("chunk"));
    }

    #[test]
    fn parses_result_event_and_detects_error() {
        let line = r#"{"type":"result","is_error":true,"result":"rate limit hit","num_turns":3}"#;
        let ev = StreamEvent::parse_line(line).unwrap();
        assert!(ev.is_error_result());
        assert_eq!(ev.extract_text().as_deref(), Some("rate limit hit"));
        assert_eq!(ev.as_result().unwrap().num_turns, 3);
    }

    #[test]
    fn unknown_type_parses_as_other() {
        let line = r#"{"type":"system_warning","detail":"ignored"}"#;
        let ev = StreamEvent::parse_line(line).unwrap();
        assert_eq!(ev, StreamEvent::Other);
        assert_eq!(ev.extract_text(), None);
    }

    #[test]
    fn non_json_line_does_not_parse() {
        assert_eq!(StreamEvent::parse_line("not json at all"), None);
    }

    #[test]
    fn non_object_json_does_not_parse() {
        assert_eq!(StreamEvent::parse_line("[1,2,3]"), None);
    }
}
