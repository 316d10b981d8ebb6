//! Wire protocol codec.
//!
//! Frames carry one JSON object each. Two failure classes are kept apart:
//!
//! - [`CodecError::Framing`]: the frame is not a JSON object at all. The connection is
//!   considered corrupted and gets re-established.
//! - [`CodecError::Decode`]: a JSON object this client cannot use (unknown tag, missing or
//!   mistyped fields, invalid values). The frame is dropped and the connection stays up.

use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{
        ChatMessage, InboundEvent, LocalSeq, MessageBody, Nickname, OutboundEvent, RoomId,
        Sequence, Timestamp, ValueObjectError,
    },
    infrastructure::{
        dto::websocket::{KNOWN_TYPES, WireEvent},
        transport::Frame,
    },
};

/// A frame that carries JSON but not an event this client understands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("malformed `{event_type}` payload: {reason}")]
    Malformed { event_type: String, reason: String },

    #[error("invalid value in `{event_type}`: {source}")]
    InvalidField {
        event_type: &'static str,
        source: ValueObjectError,
    },

    /// A client-to-server event arrived from the server
    #[error("unexpected `{0}` event from server")]
    UnexpectedDirection(&'static str),
}

/// Codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The frame cannot be read as a JSON object; the stream is corrupted
    #[error("corrupted frame: {0}")]
    Framing(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode `{event_type}`: {reason}")]
    Encode {
        event_type: &'static str,
        reason: String,
    },
}

impl CodecError {
    /// Whether the connection must be dropped because of this error
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Self::Framing(_))
    }
}

/// Encode a wire event into a text frame
pub fn encode(event: &WireEvent) -> Result<Frame, CodecError> {
    serde_json::to_string(event)
        .map(Frame::Text)
        .map_err(|e| CodecError::Encode {
            event_type: event.type_name(),
            reason: e.to_string(),
        })
}

/// Decode a text or binary frame into a wire event
pub fn decode(frame: &Frame) -> Result<WireEvent, CodecError> {
    let text = match frame {
        Frame::Text(text) => text.as_str(),
        Frame::Binary(bytes) => std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Framing(format!("binary frame is not UTF-8: {e}")))?,
    };

    let value: Value = serde_json::from_str(text)
        .map_err(|e| CodecError::Framing(format!("frame is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(CodecError::Framing("frame is not a JSON object".to_string()));
    }

    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();
    if !KNOWN_TYPES.contains(&event_type.as_str()) {
        return Err(DecodeError::UnknownType(event_type).into());
    }

    serde_json::from_value(value).map_err(|e| {
        DecodeError::Malformed {
            event_type,
            reason: e.to_string(),
        }
        .into()
    })
}

impl From<OutboundEvent> for WireEvent {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::Auth(credentials) => WireEvent::Auth {
                token: credentials.token.expose().to_string(),
                nickname: credentials.nickname.as_str().to_string(),
            },
            OutboundEvent::Join(room_id) => WireEvent::Join {
                room_id: room_id.into_string(),
            },
            OutboundEvent::Leave(room_id) => WireEvent::Leave {
                room_id: room_id.into_string(),
            },
            OutboundEvent::Send {
                room_id,
                body,
                local_seq,
            } => WireEvent::Send {
                room_id: room_id.into_string(),
                body: body.into_string(),
                local_seq: local_seq.value(),
            },
            OutboundEvent::Heartbeat => WireEvent::Heartbeat,
        }
    }
}

impl TryFrom<WireEvent> for InboundEvent {
    type Error = DecodeError;

    fn try_from(event: WireEvent) -> Result<Self, DecodeError> {
        let event_type = event.type_name();
        let invalid = |source| DecodeError::InvalidField { event_type, source };

        match event {
            WireEvent::Authenticated { nickname } => Ok(InboundEvent::Authenticated {
                nickname: Nickname::new(nickname).map_err(invalid)?,
            }),
            WireEvent::MessageReceived {
                room_id,
                sender,
                body,
                sent_at,
                seq,
            } => Ok(InboundEvent::MessageReceived(ChatMessage::inbound(
                RoomId::new(room_id).map_err(invalid)?,
                Nickname::new(sender).map_err(invalid)?,
                MessageBody::new(body).map_err(invalid)?,
                Timestamp::new(sent_at),
                Sequence::new(seq),
            ))),
            WireEvent::Heartbeat => Ok(InboundEvent::Heartbeat),
            WireEvent::Ack { local_seq } => {
                Ok(InboundEvent::Ack(LocalSeq::new(local_seq).map_err(invalid)?))
            }
            WireEvent::Error { code, message } => Ok(InboundEvent::Error { code, message }),
            WireEvent::Auth { .. }
            | WireEvent::Join { .. }
            | WireEvent::Leave { .. }
            | WireEvent::Send { .. } => Err(DecodeError::UnexpectedDirection(event_type)),
        }
    }
}

/// Decode a frame straight into a domain event
pub fn decode_inbound(frame: &Frame) -> Result<InboundEvent, CodecError> {
    let event = decode(frame)?;
    Ok(InboundEvent::try_from(event)?)
}

/// Encode a domain event into a frame
pub fn encode_outbound(event: OutboundEvent) -> Result<Frame, CodecError> {
    encode(&WireEvent::from(event))
}
