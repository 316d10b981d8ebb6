//! Session events in domain terms.
//!
//! The wire codec translates these to and from frames; nothing here knows
//! about JSON or sockets.

use super::{ChatMessage, Credentials, LocalSeq, MessageBody, Nickname, OutboundEntry, RoomId};

/// Events the session sends to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// First frame after the transport connects
    Auth(Credentials),
    Join(RoomId),
    Leave(RoomId),
    /// A queued message; `local_seq` lets the server ack and de-duplicate it
    Send {
        room_id: RoomId,
        body: MessageBody,
        local_seq: LocalSeq,
    },
    Heartbeat,
}

impl OutboundEvent {
    /// Build the send event for a queued entry
    pub fn send(entry: &OutboundEntry) -> Self {
        Self::Send {
            room_id: entry.message.room_id.clone(),
            body: entry.message.body.clone(),
            local_seq: entry.local_seq,
        }
    }
}

/// Events received from the server, validated into domain types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Handshake accepted
    Authenticated { nickname: Nickname },
    MessageReceived(ChatMessage),
    Heartbeat,
    Ack(LocalSeq),
    Error { code: u16, message: String },
}

impl InboundEvent {
    /// Kind used to route the event to per-type listeners
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::MessageReceived(_) => EventKind::Message,
            Self::Heartbeat => EventKind::Heartbeat,
            Self::Ack(_) => EventKind::Ack,
            Self::Error { .. } => EventKind::ServerError,
        }
    }
}

/// Inbound event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Authenticated,
    Message,
    Heartbeat,
    Ack,
    ServerError,
}
