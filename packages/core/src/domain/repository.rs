//! Repository trait for the presence/state store.
//!
//! The domain layer defines the trait; the infrastructure layer provides the
//! implementation (dependency inversion).

use async_trait::async_trait;

use super::{ChatMessage, RoomId, RoomSummary};

/// Process-wide store of room summaries, keyed by room id.
///
/// Reads are open to list-rendering collaborators. Writes come only from the
/// session's room handling and inbound dispatch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomSummaryRepository: Send + Sync {
    /// Get a room summary by id
    async fn get(&self, room_id: &RoomId) -> Option<RoomSummary>;

    /// All known room summaries, newest activity first
    async fn list(&self) -> Vec<RoomSummary>;

    /// Record an inbound message, creating the summary with defaults if needed
    async fn record_message(&self, message: &ChatMessage, count_unread: bool) -> RoomSummary;

    /// Zero the unread count, creating the summary with defaults if needed
    async fn mark_read(&self, room_id: &RoomId) -> RoomSummary;

    /// Merge a server-fetched snapshot.
    ///
    /// Rooms absent from the snapshot are kept; a row never rolls back a summary that
    /// has seen a newer message.
    async fn apply_snapshot(&self, snapshot: Vec<RoomSummary>);

    /// Remove every summary (logout)
    async fn clear(&self);
}
