//! Cross-context message types emitted by the streaming embed.
//!
//! The widget posts `{ "type": "streaming-embed", "action": ... }` to the
//! host page. Pages receive plenty of unrelated messages on the same
//! channel, so the payload is kept as raw JSON until it is inspected.
//!
//! # Example
//!
//! ```rust
//! use session_timing::embed::message::{EmbedAction, InboundMessage};
//!
//! let json = r#"{
//!   "origin": "https://labs.heygen.com",
//!   "data": { "type": "streaming-embed", "action": "show" }
//! }"#;
//!
//! let message: InboundMessage = serde_json::from_str(json).unwrap();
//! assert_eq!(message.embed_action(), Some(EmbedAction::Show));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Value of the `type` field carried by every embed lifecycle message.
pub const EMBED_MESSAGE_TYPE: &str = "streaming-embed";

/// Lifecycle action reported by the embed widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedAction {
    /// Widget finished loading; not a session boundary.
    Init,
    /// Stream expanded: a session starts.
    Show,
    /// Stream collapsed: the session ends.
    Hide,
}

impl fmt::Display for EmbedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EmbedAction::Init => "init",
            EmbedAction::Show => "show",
            EmbedAction::Hide => "hide",
        };
        f.write_str(s)
    }
}

impl FromStr for EmbedAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(EmbedAction::Init),
            "show" => Ok(EmbedAction::Show),
            "hide" => Ok(EmbedAction::Hide),
            other => Err(format!("unknown embed action: {}", other)),
        }
    }
}

/// Typed view of an embed lifecycle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedMessage {
    /// Message family; `streaming-embed` for the widget.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Raw action name.
    #[serde(default)]
    pub action: Option<String>,
}

impl EmbedMessage {
    /// Build a well-formed embed message for `action`.
    pub fn new(action: EmbedAction) -> Self {
        Self {
            message_type: EMBED_MESSAGE_TYPE.to_string(),
            action: Some(action.to_string()),
        }
    }

    /// Parsed action, if the payload is an embed message with a known action.
    pub fn action(&self) -> Option<EmbedAction> {
        if self.message_type != EMBED_MESSAGE_TYPE {
            return None;
        }
        self.action.as_deref().and_then(|a| a.parse().ok())
    }
}

/// A message as delivered on the page's cross-context channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Origin of the sending context, e.g. `https://labs.heygen.com`.
    pub origin: String,

    /// Arbitrary payload posted by the sender.
    #[serde(default)]
    pub data: JsonValue,
}

impl InboundMessage {
    /// Construct an embed lifecycle message from `origin`.
    pub fn embed(origin: impl Into<String>, action: EmbedAction) -> Self {
        Self {
            origin: origin.into(),
            data: serde_json::to_value(EmbedMessage::new(action)).unwrap_or(JsonValue::Null),
        }
    }

    /// Decode the payload as an embed message.
    ///
    /// Returns `None` for payloads that are not objects or lack a `type`.
    pub fn embed_message(&self) -> Option<EmbedMessage> {
        if !self.data.is_object() {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Shortcut for `embed_message().and_then(|m| m.action())`.
    pub fn embed_action(&self) -> Option<EmbedAction> {
        self.embed_message().and_then(|m| m.action())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_round_trips_through_str() {
        assert_eq!("hide".parse::<EmbedAction>(), Ok(EmbedAction::Hide));
        assert_eq!(EmbedAction::Init.to_string(), "init");
        assert!("expand".parse::<EmbedAction>().is_err());
    }

    #[test]
    fn test_embed_constructor_builds_payload() {
        let message = InboundMessage::embed("https://labs.heygen.com", EmbedAction::Hide);
        assert_eq!(
            message.data,
            json!({"type": "streaming-embed", "action": "hide"})
        );
    }

    #[test]
    fn test_foreign_type_has_no_action() {
        let message = InboundMessage {
            origin: "https://labs.heygen.com".to_string(),
            data: json!({"type": "analytics", "action": "show"}),
        };
        assert!(message.embed_message().is_some());
        assert_eq!(message.embed_action(), None);
    }

    #[test]
    fn test_non_object_payload_is_ignored() {
        let message = InboundMessage {
            origin: "https://labs.heygen.com".to_string(),
            data: json!("show"),
        };
        assert_eq!(message.embed_message(), None);
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"origin": "https://labs.heygen.com"}"#).unwrap();
        assert!(message.data.is_null());
        assert_eq!(message.embed_action(), None);
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let message = InboundMessage {
            origin: "https://labs.heygen.com".to_string(),
            data: json!({"type": "streaming-embed", "action": "resize"}),
        };
        assert_eq!(message.embed_action(), None);
    }
}
