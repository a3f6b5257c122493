// src/message.rs - Pipeline message envelope and processing outcomes
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Metadata key marking the synthetic replay messages produced by the host.
pub const PING_META_KEY: &str = "ping";

/// One pipeline message: a structured payload plus string metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Structured payload
    pub payload: JsonValue,
    /// String-keyed metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Message {
    /// Message without metadata
    pub fn new(payload: JsonValue) -> Self {
        Self {
            payload,
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style metadata insertion
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Synthetic replay message; the payload is never inspected.
    pub fn ping() -> Self {
        Self::new(JsonValue::Null)
            .with_metadata(PING_META_KEY, chrono::Utc::now().to_rfc3339())
    }

    /// True when the message carries the ping marker
    pub fn is_ping(&self) -> bool {
        self.metadata.contains_key(PING_META_KEY)
    }

    /// Look up one metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Why the engine produced no output for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Non-alarm traffic while `sendAlarmOnly` is set
    Suppressed,
    /// Ping with no background send outstanding
    Ping,
    /// The alarm message could not be assembled
    BuildFailed(String),
}

/// Result of handing one message to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Alarm notification
    Emit(Message),
    /// The inbound message, unchanged
    Forward(Message),
    /// Nothing to send
    Drop(DropReason),
}

impl Outcome {
    /// Message to hand downstream, if any
    pub fn into_message(self) -> Option<Message> {
        match self {
            Outcome::Emit(msg) | Outcome::Forward(msg) => Some(msg),
            Outcome::Drop(_) => None,
        }
    }

    /// True for alarm notifications
    pub fn is_alarm(&self) -> bool {
        matches!(self, Outcome::Emit(_))
    }
}
