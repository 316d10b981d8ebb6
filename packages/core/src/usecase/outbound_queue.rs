//! UseCase: 送信キュー
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - OutboundQueue の enqueue / flush / ack / タイムアウト / retry / discard
//!
//! ### なぜこのテストが必要か
//! - オフライン中に積んだメッセージが積んだ順（FIFO）に送られることを保証する
//! - 上限到達時にキューを変更せず QueueFull を返すことを保証する
//! - ack が無いまま送信タイムアウトしたエントリが自動再送されないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：切断中の enqueue と Ready 時の flush、ack による Sent 化
//! - 異常系：キュー満杯、存在しない local_seq への操作
//! - エッジケース：送信済みで未 ack のまま切断された場合の再送

use std::{collections::VecDeque, time::Duration};

use tokio::time::Instant;

use crate::domain::{
    ChatMessage, DeliveryState, LocalSeq, MessageBody, Nickname, OutboundEntry, OutboundEvent,
    QueueError, RoomId, Timestamp,
};

/// Default maximum number of entries retained in the queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// FIFO buffer of locally composed messages, ordered by local sequence
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<OutboundEntry>,
    next_seq: LocalSeq,
    capacity: usize,
}

impl OutboundQueue {
    /// Create an empty queue holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: LocalSeq::first(),
            capacity,
        }
    }

    /// Append a pending message.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueFull` without touching the queue (or the sequence
    /// counter) when the bound is reached.
    pub fn enqueue(
        &mut self,
        room_id: RoomId,
        sender: Nickname,
        body: MessageBody,
        sent_at: Timestamp,
    ) -> Result<&OutboundEntry, QueueError> {
        if self.entries.len() >= self.capacity {
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        let local_seq = self.next_seq;
        self.next_seq = local_seq.next();
        let message = ChatMessage::outbound(room_id, sender, body, sent_at, local_seq);
        self.entries.push_back(OutboundEntry::new(local_seq, message));

        tracing::debug!("Queued outbound message #{}", local_seq);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Take every pending entry not yet on the wire, oldest first, marking it transmitted.
    ///
    /// This is the flush run on each transition into `Ready`; while `Ready` it also
    /// transmits new and retried entries.
    pub fn take_unsent(&mut self, now: Instant) -> Vec<OutboundEvent> {
        self.entries
            .iter_mut()
            .filter(|entry| entry.state() == DeliveryState::Pending && entry.transmitted_at.is_none())
            .map(|entry| {
                entry.transmitted_at = Some(now);
                OutboundEvent::send(entry)
            })
            .collect()
    }

    /// Resolve an ack: the entry leaves the queue in the `Sent` state.
    ///
    /// A late ack for a `Failed` entry still resolves it.
    pub fn ack(&mut self, local_seq: LocalSeq) -> Option<OutboundEntry> {
        let index = self.position(local_seq)?;
        let mut entry = self.entries.remove(index)?;
        entry.message.delivery_state = DeliveryState::Sent;
        Some(entry)
    }

    /// Mark in-flight entries older than `timeout` as `Failed`, returning them.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<OutboundEntry> {
        let mut failed = Vec::new();
        for entry in self.entries.iter_mut() {
            let Some(transmitted_at) = entry.transmitted_at else {
                continue;
            };
            if entry.state() == DeliveryState::Pending && now >= transmitted_at + timeout {
                entry.message.delivery_state = DeliveryState::Failed;
                failed.push(entry.clone());
            }
        }
        failed
    }

    /// Earliest instant at which an in-flight entry times out
    pub fn next_deadline(&self, timeout: Duration) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|entry| entry.is_in_flight())
            .filter_map(|entry| entry.transmitted_at)
            .min()
            .map(|transmitted_at| transmitted_at + timeout)
    }

    /// Put a `Failed` entry back to `Pending` so the next flush transmits it.
    pub fn retry(&mut self, local_seq: LocalSeq) -> Result<&OutboundEntry, QueueError> {
        let index = self
            .position(local_seq)
            .ok_or(QueueError::EntryNotFound(local_seq))?;
        let entry = &mut self.entries[index];
        if entry.state() != DeliveryState::Failed {
            return Err(QueueError::NotFailed(local_seq));
        }
        entry.message.delivery_state = DeliveryState::Pending;
        entry.transmitted_at = None;
        Ok(&self.entries[index])
    }

    /// Remove an entry on the caller's request
    pub fn discard(&mut self, local_seq: LocalSeq) -> Result<OutboundEntry, QueueError> {
        let index = self
            .position(local_seq)
            .ok_or(QueueError::EntryNotFound(local_seq))?;
        self.entries
            .remove(index)
            .ok_or(QueueError::EntryNotFound(local_seq))
    }

    /// The connection dropped: in-flight entries go back to waiting for the next flush.
    ///
    /// They keep their local sequence so the server can de-duplicate.
    pub fn requeue_in_flight(&mut self) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.is_in_flight()) {
            entry.transmitted_at = None;
            count += 1;
        }
        count
    }

    pub fn get(&self, local_seq: LocalSeq) -> Option<&OutboundEntry> {
        self.position(local_seq).map(|index| &self.entries[index])
    }

    /// All retained entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &OutboundEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry (logout). The sequence counter keeps counting.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, local_seq: LocalSeq) -> Option<usize> {
        // Entries are sorted by local sequence
        self.entries
            .binary_search_by_key(&local_seq, |entry| entry.local_seq)
            .ok()
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
