//! Infrastructure layer.
//!
//! Concrete implementations behind the domain's seams: the wire codec, transports,
//! the in-memory room summary store and the HTTP room list source.

pub mod codec;
pub mod dto;
pub mod repository;
pub mod room_list;
pub mod transport;

pub use codec::{CodecError, DecodeError, decode, encode};
pub use repository::InMemoryRoomSummaryRepository;
pub use room_list::{HttpRoomListSource, RoomListError, RoomListSource};
pub use transport::{
    Frame, FrameSink, FrameStream, Link, Transport, TransportError, WebSocketTransport,
};
