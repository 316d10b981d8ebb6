//! WebSocket event DTOs for the chat session.
//!
//! Every frame carries one JSON object tagged by `type`:
//!
//! ```json
//! {"type":"message-received","room_id":"alice","sender":"alice","body":"hi","sent_at":1700000000000,"seq":5}
//! ```

use serde::{Deserialize, Serialize};

/// Tags understood by this client, in wire spelling
pub const KNOWN_TYPES: [&str; 9] = [
    "auth",
    "authenticated",
    "join",
    "leave",
    "send",
    "message-received",
    "heartbeat",
    "ack",
    "error",
];

/// One event on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireEvent {
    /// Client -> server, first frame after connecting
    Auth { token: String, nickname: String },
    /// Server -> client, handshake accepted
    Authenticated { nickname: String },
    /// Client -> server
    Join { room_id: String },
    /// Client -> server
    Leave { room_id: String },
    /// Client -> server
    Send {
        room_id: String,
        body: String,
        local_seq: u64,
    },
    /// Server -> client
    MessageReceived {
        room_id: String,
        sender: String,
        body: String,
        /// Unix timestamp (milliseconds since epoch) in JST
        sent_at: i64,
        seq: u64,
    },
    /// Both directions
    Heartbeat,
    /// Server -> client, correlates to `Send::local_seq`
    Ack { local_seq: u64 },
    /// Server -> client
    Error { code: u16, message: String },
}

impl WireEvent {
    /// Wire spelling of the event's tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Authenticated { .. } => "authenticated",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Send { .. } => "send",
            Self::MessageReceived { .. } => "message-received",
            Self::Heartbeat => "heartbeat",
            Self::Ack { .. } => "ack",
            Self::Error { .. } => "error",
        }
    }
}
