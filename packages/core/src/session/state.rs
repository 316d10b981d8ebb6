//! The session's single coordination point.
//!
//! Connection state, the active room, the outbound queue and the dispatcher are
//! mutated only through [`SessionCore`], which lives behind one lock. Invariants that
//! span them (a `Ready` session has a writer; the active room is joined once
//! `Ready`) are kept here.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, Notify, broadcast, mpsc},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        ConnectionState, Credentials, DeliveryState, InboundEvent, LocalSeq, MessageBody,
        OutboundEntry, OutboundEvent, QueueError, RoomId, RoomSummary, RoomSummaryRepository,
        Timestamp,
    },
    infrastructure::Transport,
    usecase::{Dispatched, MessageDispatcher, OutboundQueue, RoomSession, SendMessageError},
};

use super::{config::SessionConfig, notification::SessionEvent};

/// State shared by the public handle and the connection manager task
pub(crate) struct SessionShared {
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) core: Mutex<SessionCore>,
}

pub(crate) struct SessionCore {
    state: ConnectionState,
    pub(crate) credentials: Credentials,
    pub(crate) room_session: RoomSession,
    pub(crate) queue: OutboundQueue,
    pub(crate) dispatcher: MessageDispatcher,
    repository: Arc<dyn RoomSummaryRepository>,
    /// Present only while `Ready`; feeds the connection's writer task
    writer: Option<mpsc::UnboundedSender<OutboundEvent>>,
    /// Cancels the running connection manager
    connection: Option<CancellationToken>,
    notifier: broadcast::Sender<SessionEvent>,
    /// Wakes the connection manager when new entries go on the wire
    transmitted: Arc<Notify>,
}

impl SessionCore {
    pub(crate) fn new(
        credentials: Credentials,
        config: &SessionConfig,
        repository: Arc<dyn RoomSummaryRepository>,
        notifier: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            credentials,
            room_session: RoomSession::new(repository.clone()),
            queue: OutboundQueue::new(config.queue_capacity),
            dispatcher: MessageDispatcher::new(repository.clone(), config.history_capacity),
            repository,
            writer: None,
            connection: None,
            notifier,
            transmitted: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn transmitted_signal(&self) -> Arc<Notify> {
        self.transmitted.clone()
    }

    /// Move to `next` if the lifecycle allows it, notifying listeners.
    pub(crate) fn transition(&mut self, next: ConnectionState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!("Ignoring invalid transition {} -> {}", self.state, next);
            return false;
        }
        tracing::info!("Connection state: {} -> {}", self.state, next);
        self.state = next;
        self.notify(SessionEvent::StateChanged(next));
        true
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.notifier.send(event);
    }

    /// Start a connection manager run; returns its cancellation token.
    pub(crate) fn begin_connect(
        &mut self,
        session_token: &CancellationToken,
    ) -> Option<CancellationToken> {
        if self.state != ConnectionState::Disconnected {
            return None;
        }
        let token = session_token.child_token();
        self.connection = Some(token.clone());
        self.transition(ConnectionState::Connecting);
        Some(token)
    }

    /// Explicit disconnect: wins over any in-flight attempt or backoff wait.
    pub(crate) fn disconnect(&mut self) {
        if let Some(token) = self.connection.take() {
            token.cancel();
        }
        self.link_lost();
        self.transition(ConnectionState::Disconnected);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state.is_ready() && self.writer.is_some()
    }

    /// Transition into `Ready`: install the writer, flush the queue, replay the join.
    pub(crate) fn enter_ready(&mut self, writer: mpsc::UnboundedSender<OutboundEvent>, now: Instant) {
        if !self.transition(ConnectionState::Ready) {
            return;
        }
        self.writer = Some(writer);

        let flushed = self.queue.take_unsent(now);
        if !flushed.is_empty() {
            tracing::info!("Flushing {} queued message(s)", flushed.len());
            self.transmitted.notify_one();
        }
        self.write(flushed);

        if let Some(join) = self.room_session.rejoin() {
            tracing::info!("Rejoining active room");
            self.write([join]);
        }
    }

    /// The transport went away (or is being torn down).
    pub(crate) fn link_lost(&mut self) {
        self.writer = None;
        let requeued = self.queue.requeue_in_flight();
        if requeued > 0 {
            tracing::debug!("{} unacked message(s) will be re-sent after reconnect", requeued);
        }
    }

    pub(crate) fn write(&self, events: impl IntoIterator<Item = OutboundEvent>) {
        let Some(writer) = &self.writer else {
            return;
        };
        for event in events {
            if writer.send(event).is_err() {
                tracing::warn!("Writer task is gone, dropping outbound frames");
                break;
            }
        }
    }

    /// Put unsent entries on the wire when `Ready`
    fn transmit_unsent(&mut self, now: Instant) {
        if !self.is_ready() {
            return;
        }
        let events = self.queue.take_unsent(now);
        if !events.is_empty() {
            self.write(events);
            self.transmitted.notify_one();
        }
    }

    pub(crate) fn enqueue(
        &mut self,
        room_id: RoomId,
        body: String,
    ) -> Result<LocalSeq, SendMessageError> {
        let body = MessageBody::new(body)?;
        let sender = self.credentials.nickname.clone();
        let local_seq = self
            .queue
            .enqueue(room_id, sender, body, Timestamp::now())?
            .local_seq;
        self.transmit_unsent(Instant::now());
        Ok(local_seq)
    }

    pub(crate) fn retry(&mut self, local_seq: LocalSeq) -> Result<(), QueueError> {
        self.queue.retry(local_seq)?;
        self.transmit_unsent(Instant::now());
        Ok(())
    }

    pub(crate) fn discard(&mut self, local_seq: LocalSeq) -> Result<OutboundEntry, QueueError> {
        self.queue.discard(local_seq)
    }

    pub(crate) async fn open(&mut self, room_id: RoomId) {
        let connected = self.is_ready();
        let events = self.room_session.open(room_id, connected).await;
        self.write(events);
    }

    pub(crate) fn close(&mut self) {
        let connected = self.is_ready();
        if let Some(leave) = self.room_session.close(connected) {
            self.write([leave]);
        }
    }

    /// Route an inbound event and surface what UI collaborators need to know.
    pub(crate) async fn handle_inbound(&mut self, event: InboundEvent) -> Dispatched {
        let active_room = self.room_session.active_room().cloned();
        let dispatched = self
            .dispatcher
            .dispatch(event, active_room.as_ref(), &mut self.queue)
            .await;

        match &dispatched {
            Dispatched::Acked(entry) => self.notify(SessionEvent::DeliveryChanged {
                local_seq: entry.local_seq,
                room_id: entry.message.room_id.clone(),
                state: DeliveryState::Sent,
            }),
            Dispatched::ServerError { code, message } => self.notify(SessionEvent::ServerError {
                code: *code,
                message: message.clone(),
            }),
            _ => {}
        }
        dispatched
    }

    /// Merge a room list snapshot; the active room stays read.
    pub(crate) async fn apply_snapshot(&mut self, snapshot: Vec<RoomSummary>) {
        self.repository.apply_snapshot(snapshot).await;
        if let Some(active) = self.room_session.active_room() {
            self.repository.mark_read(active).await;
        }
    }

    /// Fail in-flight entries whose ack did not arrive within `timeout`.
    pub(crate) fn expire_sends(&mut self, now: Instant, timeout: Duration) {
        for entry in self.queue.expire(now, timeout) {
            tracing::warn!(
                "No ack for message #{} to '{}' within {:?}, marking failed",
                entry.local_seq,
                entry.message.room_id,
                timeout
            );
            self.notify(SessionEvent::DeliveryChanged {
                local_seq: entry.local_seq,
                room_id: entry.message.room_id.clone(),
                state: DeliveryState::Failed,
            });
        }
    }

    /// Drop everything tied to the logged-in user
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.dispatcher.clear();
        self.room_session.close(false);
    }
}
