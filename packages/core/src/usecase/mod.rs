//! UseCase 層
//!
//! チャットセッションのビジネスロジックを実装するレイヤー。
//! セッション層から呼び出され、Domain 層を操作します。
//! いずれもネットワーク I/O を持たず、送信すべきイベントを返すだけです。

pub mod dispatcher;
pub mod error;
pub mod outbound_queue;
pub mod room_session;

pub use dispatcher::{
    Dispatched, EventListener, MessageDispatcher, MessageListener, SubscriptionHandle,
};
pub use error::{AuthError, ConnectError, SendMessageError};
pub use outbound_queue::OutboundQueue;
pub use room_session::RoomSession;
