//! Domain layer for the chat session core.
//!
//! This module contains the chat model and its rules, independent of
//! the wire format and of any transport.

pub mod connection;
pub mod entity;
pub mod error;
pub mod event;
pub mod repository;
pub mod value_object;

pub use connection::ConnectionState;
pub use entity::{
    ChatMessage, Credentials, DeliveryState, MessageId, OutboundEntry, RoomSummary,
};
pub use error::{QueueError, ValueObjectError};
pub use event::{EventKind, InboundEvent, OutboundEvent};
pub use repository::RoomSummaryRepository;
#[cfg(test)]
pub use repository::MockRoomSummaryRepository;
pub use value_object::{AuthToken, LocalSeq, MessageBody, Nickname, RoomId, Sequence, Timestamp};
