use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON text frame on the socket.
///
/// An `event` frame carrying an `id` asks the peer to answer with an `ack`
/// frame holding the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Event {
        event: String,
        #[serde(default)]
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },
    Ack {
        id: u64,
        #[serde(default)]
        data: Value,
    },
}

impl Frame {
    pub fn event(event: &str, data: Value) -> Self {
        Frame::Event {
            event: event.to_string(),
            data,
            id: None,
        }
    }

    pub fn event_with_ack(event: &str, data: Value, id: u64) -> Self {
        Frame::Event {
            event: event.to_string(),
            data,
            id: Some(id),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
