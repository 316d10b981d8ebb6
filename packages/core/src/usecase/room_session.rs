//! UseCase: アクティブルームの切り替え
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RoomSession::open() / close() / rejoin()
//!
//! ### なぜこのテストが必要か
//! - ルーム切り替え時に Leave{A} が Join{B} より先に送られること（close-then-open）を保証する
//! - 未接続時は join/leave を送らず、再接続時に join が再送されることを保証する
//! - ルームを開くと未読数が 0 になることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続中のルーム切り替え
//! - エッジケース：未接続でのルーム切り替え、同じルームを再度開く

use std::sync::Arc;

use crate::domain::{OutboundEvent, RoomId, RoomSummaryRepository};

/// Tracks the single active room
pub struct RoomSession {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomSummaryRepository>,
    active: Option<RoomId>,
}

impl RoomSession {
    /// 新しい RoomSession を作成
    pub fn new(repository: Arc<dyn RoomSummaryRepository>) -> Self {
        Self {
            repository,
            active: None,
        }
    }

    /// Make `room_id` the active room.
    ///
    /// Zeroes the room's unread count. When `connected`, returns the frames to send:
    /// `Leave` for the previous room (if any) followed by `Join` for the new one.
    /// When not connected nothing is sent; the join is replayed by [`Self::rejoin`].
    pub async fn open(&mut self, room_id: RoomId, connected: bool) -> Vec<OutboundEvent> {
        let mut events = Vec::new();

        if self.active.as_ref() == Some(&room_id) {
            self.repository.mark_read(&room_id).await;
            return events;
        }

        if let Some(previous) = self.close(connected) {
            events.push(previous);
        }

        self.repository.mark_read(&room_id).await;
        tracing::info!("Active room is now '{}'", room_id);
        if connected {
            events.push(OutboundEvent::Join(room_id.clone()));
        } else {
            tracing::debug!("Not connected, deferring join of '{}'", room_id);
        }
        self.active = Some(room_id);

        events
    }

    /// Leave the active room.
    ///
    /// The active room is cleared whatever the connection state; `Leave` is only
    /// returned when `connected`.
    pub fn close(&mut self, connected: bool) -> Option<OutboundEvent> {
        let previous = self.active.take()?;
        tracing::info!("Left room '{}'", previous);
        connected.then_some(OutboundEvent::Leave(previous))
    }

    /// Join to replay on entering `Ready`
    pub fn rejoin(&self) -> Option<OutboundEvent> {
        self.active.clone().map(OutboundEvent::Join)
    }

    pub fn active_room(&self) -> Option<&RoomId> {
        self.active.as_ref()
    }
}
