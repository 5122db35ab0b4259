//! Messages: the wire-agnostic unit of conversation carried by tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The calling agent or human.
    User,
    /// The gateway itself.
    Agent,
}

/// A single part of a message or artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// A plain-text part.
    Text {
        /// The text body.
        text: String,
    },
    /// A structured data part, carrying an arbitrary JSON payload.
    Data {
        /// MIME type describing `data`, e.g. `"application/json"`.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// The structured payload.
        data: Value,
    },
}

impl Part {
    /// Build a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Build a JSON data part with `mimeType: "application/json"`.
    pub fn json(data: Value) -> Self {
        Self::Data {
            mime_type: "application/json".to_string(),
            data,
        }
    }

    /// The payload object of a data part whose `data` is a JSON object
    /// containing a string `skill` field, per the skill router's first
    /// resolution rule.
    pub fn as_skill_directive(&self) -> Option<(&str, &serde_json::Map<String, Value>)> {
        match self {
            Self::Data { data, .. } => {
                let obj = data.as_object()?;
                let skill = obj.get("skill")?.as_str()?;
                Some((skill, obj))
            }
            Self::Text { .. } => None,
        }
    }

    /// The text of a `Text` part, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Data { .. } => None,
        }
    }
}

/// An ordered sequence of parts attributed to a role, optionally threaded
/// into a multi-turn session via `context_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Ordered content parts.
    pub parts: Vec<Part>,
    /// Optional session thread identifier.
    #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// When the message was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a user message from parts with no context thread.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
            context_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Build an agent message from parts.
    pub fn agent(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Agent,
            parts,
            context_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Attach a context id, builder-style.
    #[must_use]
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Concatenate the text of every `Text` part, in order, separated by a
    /// single space. Used by the skill router's text-routing fallback.
    pub fn concatenated_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The first data part carrying an explicit `skill` directive, if any.
    pub fn skill_directive(&self) -> Option<(&str, &serde_json::Map<String, Value>)> {
        self.parts.iter().find_map(Part::as_skill_directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skill_directive_found_in_first_matching_data_part() {
        let msg = Message::user(vec![
            Part::text("preamble"),
            Part::json(json!({"skill": "check_status", "requestId": "abc"})),
        ]);
        let (skill, obj) = msg.skill_directive().unwrap();
        assert_eq!(skill, "check_status");
        assert_eq!(obj.get("requestId").unwrap(), "abc");
    }

    #[test]
    fn concatenated_text_joins_text_parts_only() {
        let msg = Message::user(vec![
            Part::text("hello"),
            Part::json(json!({"foo": "bar"})),
            Part::text("world"),
        ]);
        assert_eq!(msg.concatenated_text(), "hello world");
    }

    #[test]
    fn serde_round_trip_preserves_tag() {
        let part = Part::text("hi");
        let s = serde_json::to_string(&part).unwrap();
        assert!(s.contains("\"kind\":\"text\""));
        let back: Part = serde_json::from_str(&s).unwrap();
        assert_eq!(part, back);
    }
}
