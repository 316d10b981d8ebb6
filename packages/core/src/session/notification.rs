//! Notifications emitted to UI collaborators.

use crate::{
    domain::{ConnectionState, DeliveryState, LocalSeq, RoomId},
    usecase::AuthError,
};

/// Broadcast to every `ChatSession::notifications` receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection state changed (e.g. to show an offline banner)
    StateChanged(ConnectionState),
    /// An outbound message was acked (`Sent`) or timed out (`Failed`)
    DeliveryChanged {
        local_seq: LocalSeq,
        room_id: RoomId,
        state: DeliveryState,
    },
    /// The server rejected the credentials; the session is `Disconnected`
    AuthRejected(AuthError),
    /// The server reported an error while `Ready`
    ServerError { code: u16, message: String },
}
