//! Core domain models for the chat session.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::value_object::{
    AuthToken, LocalSeq, MessageBody, Nickname, RoomId, Sequence, Timestamp,
};

/// Identity of the logged-in user, bound to a session at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque session token
    pub token: AuthToken,
    /// The user's own nickname
    pub nickname: Nickname,
}

impl Credentials {
    pub fn new(token: AuthToken, nickname: Nickname) -> Self {
        Self { token, nickname }
    }
}

/// Per-room summary rendered by room list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room identifier
    pub room_id: RoomId,
    /// Nickname of the other participant, when known
    pub peer_nickname: Option<Nickname>,
    /// Body of the latest message seen in the room
    pub last_message: Option<MessageBody>,
    /// Timestamp of the latest message seen in the room
    pub last_message_time: Option<Timestamp>,
    /// Messages received while the room was not active
    pub unread_count: u32,
    /// Opaque reference to the peer's profile image (URL or asset key)
    pub profile_image_ref: Option<String>,
}

impl RoomSummary {
    /// Create a summary with defaults for a room seen for the first time
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            peer_nickname: None,
            last_message: None,
            last_message_time: None,
            unread_count: 0,
            profile_image_ref: None,
        }
    }

    /// Record an inbound message as the room's latest.
    ///
    /// `count_unread` is false while the room is the active one.
    pub fn record_message(&mut self, message: &ChatMessage, count_unread: bool) {
        self.last_message = Some(message.body.clone());
        self.last_message_time = Some(message.sent_at);
        if self.peer_nickname.is_none() {
            self.peer_nickname = Some(message.sender.clone());
        }
        if count_unread {
            self.unread_count = self.unread_count.saturating_add(1);
        }
    }

    /// Zero the unread counter (room opened or read)
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }

    /// Merge a server-fetched row for the same room.
    ///
    /// The server row wins unless this summary saw a strictly newer message, in which
    /// case only the peer details are taken from the row.
    pub fn merge_snapshot(&mut self, snapshot: RoomSummary) {
        if self.last_message_time > snapshot.last_message_time {
            if snapshot.peer_nickname.is_some() {
                self.peer_nickname = snapshot.peer_nickname;
            }
            if snapshot.profile_image_ref.is_some() {
                self.profile_image_ref = snapshot.profile_image_ref;
            }
            return;
        }
        *self = snapshot;
    }
}

/// Delivery state of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Outbound, waiting for the server's ack
    Pending,
    /// Acknowledged by the server (inbound messages are always `Sent`)
    Sent,
    /// No ack arrived within the send timeout; needs an explicit retry
    Failed,
}

/// Identifies a message inside its room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    /// Sequence assigned by the server (inbound)
    Server(Sequence),
    /// Sequence assigned by the local outbound queue
    Local(LocalSeq),
}

/// Represents a chat message in the domain model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message belongs to
    pub room_id: RoomId,
    /// Sender's nickname
    pub sender: Nickname,
    /// Message text
    pub body: MessageBody,
    /// Timestamp when the message was sent
    pub sent_at: Timestamp,
    /// Server sequence or local sequence
    pub id: MessageId,
    /// Delivery state
    pub delivery_state: DeliveryState,
}

impl ChatMessage {
    /// Create a message received from the server
    pub fn inbound(
        room_id: RoomId,
        sender: Nickname,
        body: MessageBody,
        sent_at: Timestamp,
        seq: Sequence,
    ) -> Self {
        Self {
            room_id,
            sender,
            body,
            sent_at,
            id: MessageId::Server(seq),
            delivery_state: DeliveryState::Sent,
        }
    }

    /// Create a message composed locally, pending delivery
    pub fn outbound(
        room_id: RoomId,
        sender: Nickname,
        body: MessageBody,
        sent_at: Timestamp,
        local_seq: LocalSeq,
    ) -> Self {
        Self {
            room_id,
            sender,
            body,
            sent_at,
            id: MessageId::Local(local_seq),
            delivery_state: DeliveryState::Pending,
        }
    }

    /// Server sequence, for inbound messages
    pub fn sequence(&self) -> Option<Sequence> {
        match self.id {
            MessageId::Server(seq) => Some(seq),
            MessageId::Local(_) => None,
        }
    }
}

/// A locally composed message waiting in the outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEntry {
    /// Local sequence used for FIFO order and ack correlation
    pub local_seq: LocalSeq,
    /// The message being delivered
    pub message: ChatMessage,
    /// When the entry was last handed to the transport; `None` until then
    pub transmitted_at: Option<Instant>,
}

impl OutboundEntry {
    pub fn new(local_seq: LocalSeq, message: ChatMessage) -> Self {
        Self {
            local_seq,
            message,
            transmitted_at: None,
        }
    }

    /// Current delivery state of the wrapped message
    pub fn state(&self) -> DeliveryState {
        self.message.delivery_state
    }

    /// Pending and already on the wire, waiting for an ack
    pub fn is_in_flight(&self) -> bool {
        self.state() == DeliveryState::Pending && self.transmitted_at.is_some()
    }
}
