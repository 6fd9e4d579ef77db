//! Turn Event Logger
//!
//! Every customer message walks `received → classified → resolved →
//! delivered | rejected`. Each transition is emitted as one structured event
//! on the `turn_events` target, with customer text redacted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

pub const TURN_EVENTS_TARGET: &str = "turn_events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnEvent {
    Received {
        text: String,
    },
    Classified {
        intent: Option<String>,
    },
    Resolved {
        handler: String,
    },
    Rerouted {
        intent: String,
    },
    Delivered {
        reply: String,
        appended: usize,
    },
    Rejected {
        error: String,
    },
}

impl TurnEvent {
    pub fn state(&self) -> &'static str {
        match self {
            TurnEvent::Received { .. } => "received",
            TurnEvent::Classified { .. } => "classified",
            TurnEvent::Resolved { .. } => "resolved",
            TurnEvent::Rerouted { .. } => "rerouted",
            TurnEvent::Delivered { .. } => "delivered",
            TurnEvent::Rejected { .. } => "rejected",
        }
    }

    fn redacted(mut self) -> Self {
        match &mut self {
            TurnEvent::Received { text } => *text = redact_sensitive_data(text),
            TurnEvent::Delivered { reply, .. } => *reply = redact_sensitive_data(reply),
            TurnEvent::Rejected { error } => *error = redact_sensitive_data(error),
            TurnEvent::Classified { .. } | TurnEvent::Resolved { .. } | TurnEvent::Rerouted { .. } => {}
        }
        self
    }
}

#[derive(Debug, Serialize)]
pub struct TurnLogEntry {
    /// Hashed conversation key; raw user ids stay out of the logs.
    pub conversation: String,
    pub timestamp: DateTime<Utc>,
    pub event: TurnEvent,
}

pub struct TurnEventLogger;

impl TurnEventLogger {
    /// Build the redacted entry for `event`.
    pub fn entry(conversation: &str, event: TurnEvent) -> TurnLogEntry {
        TurnLogEntry {
            conversation: conversation.to_string(),
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }

    /// Emit one turn transition.
    pub fn log_event(conversation: &str, event: TurnEvent) {
        let entry = Self::entry(conversation, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(
            target: TURN_EVENTS_TARGET,
            conversation = %entry.conversation,
            state = entry.event.state(),
            event = %json,
            "Turn event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_redacts_customer_text() {
        let entry = TurnEventLogger::entry(
            "ab12",
            TurnEvent::Received {
                text: "call me at 555-123-4567".into(),
            },
        );
        assert_eq!(
            entry.event,
            TurnEvent::Received {
                text: "call me at [REDACTED_PHONE]".into()
            }
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(TurnEvent::Classified {
            intent: Some("order_status".into()),
        })
        .unwrap();
        assert_eq!(json["state"], "classified");
        assert_eq!(json["intent"], "order_status");
        assert_eq!(TurnEvent::Rejected { error: "x".into() }.state(), "rejected");
    }
}
