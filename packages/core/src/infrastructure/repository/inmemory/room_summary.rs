//! InMemory RoomSummary Repository 実装
//!
//! ドメイン層が定義する RoomSummaryRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。プロセスの再起動をまたいだ永続化は行わず、
//! サーバーから取得したスナップショットとライブイベントから再構築されます。

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, RoomId, RoomSummary, RoomSummaryRepository};

/// インメモリ RoomSummary Repository 実装
#[derive(Clone, Default)]
pub struct InMemoryRoomSummaryRepository {
    /// roomId -> RoomSummary
    rooms: Arc<Mutex<HashMap<RoomId, RoomSummary>>>,
}

impl InMemoryRoomSummaryRepository {
    /// 空の InMemoryRoomSummaryRepository を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomSummaryRepository for InMemoryRoomSummaryRepository {
    async fn get(&self, room_id: &RoomId) -> Option<RoomSummary> {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).cloned()
    }

    async fn list(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.lock().await;
        let mut summaries: Vec<RoomSummary> = rooms.values().cloned().collect();

        // Newest activity first; rooms without messages last, then by id for stable output
        summaries.sort_by(|a, b| {
            Reverse(a.last_message_time)
                .cmp(&Reverse(b.last_message_time))
                .then_with(|| a.room_id.as_str().cmp(b.room_id.as_str()))
        });
        summaries
    }

    async fn record_message(&self, message: &ChatMessage, count_unread: bool) -> RoomSummary {
        let mut rooms = self.rooms.lock().await;
        let summary = rooms
            .entry(message.room_id.clone())
            .or_insert_with(|| RoomSummary::new(message.room_id.clone()));
        summary.record_message(message, count_unread);
        summary.clone()
    }

    async fn mark_read(&self, room_id: &RoomId) -> RoomSummary {
        let mut rooms = self.rooms.lock().await;
        let summary = rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomSummary::new(room_id.clone()));
        summary.mark_read();
        summary.clone()
    }

    async fn apply_snapshot(&self, snapshot: Vec<RoomSummary>) {
        let mut rooms = self.rooms.lock().await;
        for summary in snapshot {
            match rooms.get_mut(&summary.room_id) {
                Some(existing) => existing.merge_snapshot(summary),
                None => {
                    rooms.insert(summary.room_id.clone(), summary);
                }
            }
        }
    }

    async fn clear(&self) {
        let mut rooms = self.rooms.lock().await;
        rooms.clear();
    }
}
