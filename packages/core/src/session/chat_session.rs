//! Public handle of a logged-in chat session.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        ChatMessage, ConnectionState, Credentials, EventKind, InboundEvent, LocalSeq,
        OutboundEntry, QueueError, RoomId, RoomSummary, RoomSummaryRepository,
    },
    infrastructure::{InMemoryRoomSummaryRepository, RoomListError, RoomListSource, Transport},
    usecase::{
        ConnectError, Dispatched, EventListener, MessageListener, SendMessageError,
        SubscriptionHandle,
    },
};

use super::{
    config::SessionConfig,
    connection::ConnectionManager,
    notification::SessionEvent,
    state::{SessionCore, SessionShared},
};

/// A chat session bound to one set of credentials.
///
/// Created at login and consumed by [`ChatSession::logout`]. Every method may be
/// called from any task; state changes are serialized internally.
pub struct ChatSession {
    shared: Arc<SessionShared>,
    repository: Arc<dyn RoomSummaryRepository>,
    notifier: broadcast::Sender<SessionEvent>,
    /// Parent of every connection manager's token
    token: CancellationToken,
}

impl ChatSession {
    /// Create a session backed by an in-memory room store
    pub fn new(
        credentials: Credentials,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_repository(
            credentials,
            config,
            transport,
            Arc::new(InMemoryRoomSummaryRepository::new()),
        )
    }

    pub fn with_repository(
        credentials: Credentials,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        repository: Arc<dyn RoomSummaryRepository>,
    ) -> Self {
        let config = config.normalized();
        let (notifier, _) = broadcast::channel(config.notification_capacity);
        let core = SessionCore::new(credentials, &config, repository.clone(), notifier.clone());
        Self {
            shared: Arc::new(SessionShared {
                config,
                transport,
                core: Mutex::new(core),
            }),
            repository,
            notifier,
            token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Receive state changes, delivery updates and server errors
    pub fn notifications(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.core.lock().await.state()
    }

    // ========================================
    // Connection
    // ========================================

    /// Connect and authenticate.
    ///
    /// Resolves once the session first reaches `Ready`. Transport failures are
    /// retried with backoff in the meantime; an authentication rejection ends the
    /// attempt with [`ConnectError::Auth`]. The connection keeps being managed in
    /// the background until [`ChatSession::disconnect`].
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        {
            let mut core = self.shared.core.lock().await;
            let Some(cancel) = core.begin_connect(&self.token) else {
                return Err(ConnectError::AlreadyConnected(core.state()));
            };
            ConnectionManager::spawn(self.shared.clone(), cancel, outcome_tx);
        }

        outcome_rx.await.unwrap_or(Err(ConnectError::Cancelled))
    }

    /// Close the connection and stop reconnecting. Queued messages are kept.
    pub async fn disconnect(&self) {
        let mut core = self.shared.core.lock().await;
        if core.state() != ConnectionState::Disconnected {
            tracing::info!("Disconnecting");
        }
        core.disconnect();
    }

    /// Replace refused credentials. Only allowed while `Disconnected`.
    pub async fn replace_credentials(
        &self,
        credentials: Credentials,
    ) -> Result<(), ConnectError> {
        let mut core = self.shared.core.lock().await;
        if core.state() != ConnectionState::Disconnected {
            return Err(ConnectError::AlreadyConnected(core.state()));
        }
        core.credentials = credentials;
        Ok(())
    }

    /// Disconnect and drop everything tied to this user
    pub async fn logout(self) {
        tracing::info!("Logging out");
        let mut core = self.shared.core.lock().await;
        core.disconnect();
        core.clear();
        self.repository.clear().await;
    }

    // ========================================
    // Rooms
    // ========================================

    /// Make `room_id` the active room, leaving the previous one first
    pub async fn open(&self, room_id: RoomId) {
        self.shared.core.lock().await.open(room_id).await;
    }

    pub async fn close(&self) {
        self.shared.core.lock().await.close();
    }

    pub async fn active_room(&self) -> Option<RoomId> {
        self.shared.core.lock().await.room_session.active_room().cloned()
    }

    // ========================================
    // Outbound messages
    // ========================================

    /// Queue a message for `room_id`.
    ///
    /// Sent right away when `Ready`, otherwise on the next transition into `Ready`.
    /// Fails with `QueueFull` when the queue is at capacity, leaving it untouched.
    pub async fn send(
        &self,
        room_id: RoomId,
        body: impl Into<String>,
    ) -> Result<LocalSeq, SendMessageError> {
        let local_seq = self.shared.core.lock().await.enqueue(room_id, body.into())?;
        tracing::debug!("Queued message #{}", local_seq);
        Ok(local_seq)
    }

    pub async fn outbound(&self, local_seq: LocalSeq) -> Option<OutboundEntry> {
        self.shared.core.lock().await.queue.get(local_seq).cloned()
    }

    /// Every queued entry, oldest first
    pub async fn outbound_entries(&self) -> Vec<OutboundEntry> {
        self.shared.core.lock().await.queue.entries().cloned().collect()
    }

    /// Put a failed message back in line
    pub async fn retry(&self, local_seq: LocalSeq) -> Result<(), QueueError> {
        self.shared.core.lock().await.retry(local_seq)
    }

    /// Give up on a queued message
    pub async fn discard(&self, local_seq: LocalSeq) -> Result<OutboundEntry, QueueError> {
        self.shared.core.lock().await.discard(local_seq)
    }

    // ========================================
    // Inbound events
    // ========================================

    pub async fn subscribe(
        &self,
        room_id: RoomId,
        listener: impl MessageListener + 'static,
    ) -> SubscriptionHandle {
        self.shared
            .core
            .lock()
            .await
            .dispatcher
            .subscribe(room_id, Arc::new(listener))
    }

    pub async fn subscribe_events(
        &self,
        kind: EventKind,
        listener: impl EventListener + 'static,
    ) -> SubscriptionHandle {
        self.shared
            .core
            .lock()
            .await
            .dispatcher
            .subscribe_events(kind, Arc::new(listener))
    }

    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.shared.core.lock().await.dispatcher.unsubscribe(handle)
    }

    /// Route an inbound event as if it came from the connection
    pub async fn dispatch(&self, event: InboundEvent) -> Dispatched {
        self.shared.core.lock().await.handle_inbound(event).await
    }

    /// Messages delivered for a room in this session, oldest first
    pub async fn history(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.shared.core.lock().await.dispatcher.history(room_id)
    }

    // ========================================
    // Room list
    // ========================================

    /// Room summaries, newest activity first
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        self.repository.list().await
    }

    pub async fn summary(&self, room_id: &RoomId) -> Option<RoomSummary> {
        self.repository.get(room_id).await
    }

    /// Merge a fresh snapshot from `source` into the store; returns the room count
    pub async fn refresh_rooms(&self, source: &dyn RoomListSource) -> Result<usize, RoomListError> {
        let credentials = self.shared.core.lock().await.credentials.clone();
        let snapshot = source.fetch(&credentials).await?;
        let count = snapshot.len();
        self.shared.core.lock().await.apply_snapshot(snapshot).await;
        tracing::info!("Loaded {} room(s)", count);
        Ok(count)
    }

    pub fn repository(&self) -> Arc<dyn RoomSummaryRepository> {
        self.repository.clone()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
