//! UseCase: 受信イベントの配送
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MessageDispatcher::dispatch() と subscribe / unsubscribe
//! - RoomSummary の更新（最新メッセージ、未読数）とルームごとの順序保証
//!
//! ### なぜこのテストが必要か
//! - 同じ seq のメッセージがリスナーに二度届かないこと（冪等性）を保証する
//! - アクティブなルームでは未読数が増えないことを保証する
//! - ack で送信キューのエントリが Sent になることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：購読中ルームへの配送、ack による解決
//! - 異常系：重複 seq、未知の local_seq への ack
//! - エッジケース：サマリーが存在しないルームへの最初のメッセージ、seq の欠番

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use crate::domain::{
    ChatMessage, EventKind, InboundEvent, LocalSeq, OutboundEntry, RoomId, RoomSummary,
    RoomSummaryRepository, Sequence,
};

use super::outbound_queue::OutboundQueue;

/// Default number of messages kept per room
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Receives the messages of one room, in order.
///
/// Called synchronously from inside the session; implementations must not block.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &ChatMessage);
}

impl<F> MessageListener for F
where
    F: Fn(&ChatMessage) + Send + Sync,
{
    fn on_message(&self, message: &ChatMessage) {
        self(message)
    }
}

/// Receives every inbound event of one kind
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &InboundEvent);
}

impl<F> EventListener for F
where
    F: Fn(&InboundEvent) + Send + Sync,
{
    fn on_event(&self, event: &InboundEvent) {
        self(event)
    }
}

/// Returned by `subscribe`; pass it to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What `dispatch` did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// New message delivered; carries the updated summary
    Delivered(RoomSummary),
    /// `seq` not newer than the last delivered one for the room
    Duplicate,
    /// Ack resolved a queued entry, now `Sent`
    Acked(OutboundEntry),
    /// Ack for a local sequence no longer queued
    UnknownAck(LocalSeq),
    ServerError { code: u16, message: String },
    /// Nothing to route beyond event-kind listeners (heartbeats, handshake frames)
    Ignored,
}

/// Routes decoded inbound events to the store, the room history and listeners
pub struct MessageDispatcher {
    repository: Arc<dyn RoomSummaryRepository>,
    next_handle: u64,
    room_listeners: HashMap<RoomId, Vec<(SubscriptionHandle, Arc<dyn MessageListener>)>>,
    event_listeners: HashMap<EventKind, Vec<(SubscriptionHandle, Arc<dyn EventListener>)>>,
    last_delivered: HashMap<RoomId, Sequence>,
    history: HashMap<RoomId, VecDeque<ChatMessage>>,
    history_capacity: usize,
}

impl MessageDispatcher {
    /// 新しい MessageDispatcher を作成
    pub fn new(repository: Arc<dyn RoomSummaryRepository>, history_capacity: usize) -> Self {
        Self {
            repository,
            next_handle: 1,
            room_listeners: HashMap::new(),
            event_listeners: HashMap::new(),
            last_delivered: HashMap::new(),
            history: HashMap::new(),
            history_capacity,
        }
    }

    /// Register a listener for one room's messages
    pub fn subscribe(
        &mut self,
        room_id: RoomId,
        listener: Arc<dyn MessageListener>,
    ) -> SubscriptionHandle {
        let handle = self.allocate_handle();
        tracing::debug!("Subscribed {} to room '{}'", handle, room_id);
        self.room_listeners
            .entry(room_id)
            .or_default()
            .push((handle, listener));
        handle
    }

    /// Register a listener for every inbound event of `kind`
    pub fn subscribe_events(
        &mut self,
        kind: EventKind,
        listener: Arc<dyn EventListener>,
    ) -> SubscriptionHandle {
        let handle = self.allocate_handle();
        self.event_listeners
            .entry(kind)
            .or_default()
            .push((handle, listener));
        handle
    }

    /// Remove a listener. Returns false if the handle was unknown.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let mut removed = false;
        for listeners in self.room_listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|(h, _)| *h != handle);
            removed |= listeners.len() != before;
        }
        for listeners in self.event_listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|(h, _)| *h != handle);
            removed |= listeners.len() != before;
        }
        self.room_listeners.retain(|_, listeners| !listeners.is_empty());
        self.event_listeners.retain(|_, listeners| !listeners.is_empty());
        removed
    }

    /// Route one inbound event.
    ///
    /// # Arguments
    ///
    /// * `event` - Decoded inbound event
    /// * `active_room` - Room currently shown to the user (suppresses unread counting)
    /// * `queue` - Outbound queue, resolved by acks
    pub async fn dispatch(
        &mut self,
        event: InboundEvent,
        active_room: Option<&RoomId>,
        queue: &mut OutboundQueue,
    ) -> Dispatched {
        let dispatched = match &event {
            InboundEvent::MessageReceived(message) => {
                return self.deliver_message(&event, message, active_room).await;
            }
            InboundEvent::Ack(local_seq) => match queue.ack(*local_seq) {
                Some(entry) => {
                    tracing::debug!("Outbound message #{} acknowledged", local_seq);
                    Dispatched::Acked(entry)
                }
                None => {
                    tracing::debug!("Ack for unknown outbound message #{}", local_seq);
                    Dispatched::UnknownAck(*local_seq)
                }
            },
            InboundEvent::Error { code, message } => {
                tracing::warn!("Server error {}: {}", code, message);
                Dispatched::ServerError {
                    code: *code,
                    message: message.clone(),
                }
            }
            InboundEvent::Heartbeat | InboundEvent::Authenticated { .. } => Dispatched::Ignored,
        };

        if !matches!(dispatched, Dispatched::UnknownAck(_)) {
            self.notify_event_listeners(&event);
        }
        dispatched
    }

    async fn deliver_message(
        &mut self,
        event: &InboundEvent,
        message: &ChatMessage,
        active_room: Option<&RoomId>,
    ) -> Dispatched {
        let room_id = &message.room_id;
        let Some(seq) = message.sequence() else {
            return Dispatched::Ignored;
        };

        if let Some(last) = self.last_delivered.get(room_id).copied() {
            if seq <= last {
                tracing::debug!(
                    "Dropping duplicate message seq {} for room '{}' (last delivered {})",
                    seq,
                    room_id,
                    last
                );
                return Dispatched::Duplicate;
            }
            if seq.value() > last.value() + 1 {
                tracing::warn!(
                    "Sequence gap in room '{}': {} -> {} (possible message loss)",
                    room_id,
                    last,
                    seq
                );
            }
        }
        self.last_delivered.insert(room_id.clone(), seq);

        let count_unread = active_room != Some(room_id);
        let summary = self.repository.record_message(message, count_unread).await;

        let history = self.history.entry(room_id.clone()).or_default();
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(message.clone());

        if let Some(listeners) = self.room_listeners.get(room_id) {
            for (_, listener) in listeners {
                listener.on_message(message);
            }
        }
        self.notify_event_listeners(event);

        Dispatched::Delivered(summary)
    }

    fn notify_event_listeners(&self, event: &InboundEvent) {
        if let Some(listeners) = self.event_listeners.get(&event.kind()) {
            for (_, listener) in listeners {
                listener.on_event(event);
            }
        }
    }

    /// Messages delivered for a room, oldest first
    pub fn history(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.history
            .get(room_id)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget listeners, history and ordering state (logout)
    pub fn clear(&mut self) {
        self.room_listeners.clear();
        self.event_listeners.clear();
        self.last_delivered.clear();
        self.history.clear();
    }

    fn allocate_handle(&mut self) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}
