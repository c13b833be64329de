//! Events module for voice session callbacks
//!
//! Provides structured event types delivered by the conversation provider
//! to the voice widget's event loop.

use serde::{Deserialize, Serialize};

/// Callbacks emitted by a voice conversation provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Provider acknowledged the session
    Connected {
        /// Provider-side conversation id, when one was handed out
        conversation_id: Option<String>,
    },

    /// Session ended, by either side
    Disconnected,

    /// The session could not be opened
    ConnectFailed {
        reason: String,
    },

    /// A transcript line from the user or the agent
    Message {
        text: String,
        is_user: bool,
    },

    /// Provider reported a failure on the session
    Error {
        message: String,
    },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Connected { .. } => write!(f, "CONNECTED"),
            SessionEvent::Disconnected => write!(f, "DISCONNECTED"),
            SessionEvent::ConnectFailed { reason } => write!(f, "CONNECT_FAILED ({})", reason),
            SessionEvent::Message { is_user, text } => {
                let who = if *is_user { "user" } else { "agent" };
                write!(f, "MESSAGE ({}, {} chars)", who, text.chars().count())
            }
            SessionEvent::Error { message } => write!(f, "ERROR ({})", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::Message {
            text: "hi".to_string(),
            is_user: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"message""#));
        assert!(json.contains(r#""is_user":true"#));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"disconnected"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, SessionEvent::Disconnected));
    }

    #[test]
    fn test_display_hides_text() {
        let event = SessionEvent::Message {
            text: "secret words".to_string(),
            is_user: false,
        };
        assert_eq!(event.to_string(), "MESSAGE (agent, 12 chars)");
    }
}
