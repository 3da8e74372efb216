//! Frames exchanged with the pub/sub hub over WebSocket (JSON text, tagged by `type`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    // client -> hub
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Publish {
        channel: String,
        seq: u64,
        message: Value,
    },

    // hub -> client
    Subscribed {
        channel: String,
    },
    Unsubscribed {
        channel: String,
    },
    Ack {
        seq: u64,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        message: String,
    },
    Message {
        channel: String,
        message: Value,
    },
}

impl Frame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
