//! Test fixtures: an in-process transport scripted from the test body.
//!
//! Every successful `connect` hands the test a [`ServerEnd`] that plays the chat
//! server for that connection.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tsunagi_core::{
    ChatSession, SessionConfig, SessionEvent,
    domain::{AuthToken, ConnectionState, Credentials, Nickname, RoomId, RoomSummary},
    infrastructure::{
        Frame, FrameSink, FrameStream, Link, RoomListError, RoomListSource, Transport,
        TransportError, decode, dto::websocket::WireEvent, encode,
    },
    session::BackoffConfig,
};

/// Server side of one fake connection
pub struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<Frame>,
    to_client: mpsc::UnboundedSender<Result<Frame, TransportError>>,
}

impl ServerEnd {
    /// Next event written by the client, heartbeats included
    pub async fn recv_any(&mut self) -> WireEvent {
        let frame = self
            .from_client
            .recv()
            .await
            .expect("client closed the connection");
        decode(&frame).expect("client sent an undecodable frame")
    }

    /// Next non-heartbeat event written by the client
    pub async fn recv(&mut self) -> WireEvent {
        loop {
            match self.recv_any().await {
                WireEvent::Heartbeat => continue,
                event => return event,
            }
        }
    }

    /// Non-heartbeat events already written by the client
    pub fn drain(&mut self) -> Vec<WireEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            let event = decode(&frame).expect("client sent an undecodable frame");
            if event != WireEvent::Heartbeat {
                events.push(event);
            }
        }
        events
    }

    pub fn push(&self, event: WireEvent) {
        let frame = encode(&event).expect("failed to encode server event");
        self.push_frame(frame);
    }

    pub fn push_frame(&self, frame: Frame) {
        let _ = self.to_client.send(Ok(frame));
    }

    /// Expect the `Auth` frame and accept it
    pub async fn accept(&mut self) -> WireEvent {
        let auth = self.recv().await;
        let WireEvent::Auth { nickname, .. } = &auth else {
            panic!("expected auth frame, got {auth:?}");
        };
        self.push(WireEvent::Authenticated {
            nickname: nickname.clone(),
        });
        auth
    }

    /// Expect the `Auth` frame and refuse it
    pub async fn reject(&mut self, code: u16, message: &str) {
        let auth = self.recv().await;
        assert!(matches!(auth, WireEvent::Auth { .. }), "expected auth frame, got {auth:?}");
        self.push(WireEvent::Error {
            code,
            message: message.to_string(),
        });
    }

    pub fn message(&self, room_id: &str, sender: &str, body: &str, seq: u64) {
        self.push(WireEvent::MessageReceived {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            sent_at: 1_700_000_000_000 + seq as i64,
            seq,
        });
    }
}

struct FakeSink(mpsc::UnboundedSender<Frame>);

#[async_trait]
impl FrameSink for FakeSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.0.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct FakeStream(mpsc::UnboundedReceiver<Result<Frame, TransportError>>);

#[async_trait]
impl FrameStream for FakeStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.0.recv().await
    }
}

/// Transport whose connections are served by the test
pub struct FakeTransport {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    failures: Mutex<VecDeque<TransportError>>,
    attempts: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, connections) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            accepted,
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        });
        (transport, connections)
    }

    /// Make the next `count` connect attempts fail
    pub fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..count {
            failures.push_back(TransportError::Connect {
                endpoint: "fake".to_string(),
                reason: "connection refused".to_string(),
            });
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, _endpoint: &str) -> Result<Link, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let server = ServerEnd {
            from_client,
            to_client,
        };
        self.accepted
            .send(server)
            .map_err(|_| TransportError::Connect {
                endpoint: "fake".to_string(),
                reason: "no server listening".to_string(),
            })?;
        Ok(Link::new(
            Box::new(FakeSink(client_tx)),
            Box::new(FakeStream(client_rx)),
        ))
    }
}

/// Room list source returning a fixed snapshot
pub struct StaticRoomList(pub Vec<RoomSummary>);

#[async_trait]
impl RoomListSource for StaticRoomList {
    async fn fetch(&self, _credentials: &Credentials) -> Result<Vec<RoomSummary>, RoomListError> {
        Ok(self.0.clone())
    }
}

pub fn room(id: &str) -> RoomId {
    RoomId::new(id).unwrap()
}

pub fn credentials(nickname: &str) -> Credentials {
    Credentials::new(
        AuthToken::new(format!("token-{nickname}")).unwrap(),
        Nickname::new(nickname).unwrap(),
    )
}

/// 30s heartbeat, 10s timeout, 1s minimum backoff without jitter
pub fn config() -> SessionConfig {
    SessionConfig::new("ws://fake/ws")
        .with_heartbeat(Duration::from_secs(30), Duration::from_secs(10))
        .with_backoff(BackoffConfig {
            jitter: 0.0,
            ..BackoffConfig::default()
        })
}

/// Connect `session` and accept the handshake on the next fake connection
pub async fn connect_ready(
    session: &ChatSession,
    connections: &mut mpsc::UnboundedReceiver<ServerEnd>,
) -> ServerEnd {
    let (result, server) = tokio::join!(session.connect(), async {
        let mut server = connections.recv().await.expect("no connection attempt");
        server.accept().await;
        server
    });
    result.expect("connect failed");
    server
}

/// Accept the next reconnect attempt
pub async fn accept_next(connections: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    let mut server = connections.recv().await.expect("no connection attempt");
    server.accept().await;
    server
}

/// Wait for the next notification matching `pred`
pub async fn wait_for(
    notifications: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = notifications.recv().await.expect("notification channel closed");
        if pred(&event) {
            return event;
        }
    }
}

pub async fn wait_for_state(
    notifications: &mut broadcast::Receiver<SessionEvent>,
    state: ConnectionState,
) {
    wait_for(notifications, |event| {
        *event == SessionEvent::StateChanged(state)
    })
    .await;
}
