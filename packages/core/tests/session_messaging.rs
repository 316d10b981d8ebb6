//! Messaging integration tests.
//!
//! Outbound queue flushing, room switching, inbound delivery and the room store,
//! driven through a scripted in-process transport.

mod fixtures;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use fixtures::{
    FakeTransport, StaticRoomList, accept_next, config, connect_ready, credentials, room,
    wait_for, wait_for_state,
};
use tsunagi_core::{
    ChatSession, SessionEvent,
    domain::{
        ChatMessage, ConnectionState, DeliveryState, EventKind, InboundEvent, LocalSeq,
        MessageBody, QueueError, RoomSummary, Timestamp,
    },
    infrastructure::dto::websocket::WireEvent,
    usecase::SendMessageError,
};

fn send_frame(room_id: &str, body: &str, local_seq: u64) -> WireEvent {
    WireEvent::Send {
        room_id: room_id.to_string(),
        body: body.to_string(),
        local_seq,
    }
}

fn seq(value: u64) -> LocalSeq {
    LocalSeq::new(value).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_offline_sends_are_flushed_in_order_on_ready() {
    // テスト項目: 未接続中に enqueue したメッセージが Ready で FIFO 順に一度ずつ送信される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    for body in ["one", "two", "three"] {
        session.send(room("alice"), body).await.unwrap();
    }

    // when (操作):
    let mut server = connect_ready(&session, &mut connections).await;

    // then (期待する結果):
    assert_eq!(server.recv().await, send_frame("alice", "one", 1));
    assert_eq!(server.recv().await, send_frame("alice", "two", 2));
    assert_eq!(server.recv().await, send_frame("alice", "three", 3));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(server.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_enqueued_message_is_sent_once_and_acked() {
    // テスト項目: enqueue("bob","hello") は localSeq=1 の Pending を返し、Ready で一度だけ送信され、Ack で Sent になる
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("carol"), config(), transport);
    let mut notifications = session.notifications();

    // when (操作):
    let local_seq = session.send(room("bob"), "hello").await.unwrap();
    let pending = session.outbound(local_seq).await.unwrap();
    let mut server = connect_ready(&session, &mut connections).await;
    let sent = server.recv().await;
    server.push(WireEvent::Ack { local_seq: 1 });
    let delivered = wait_for(&mut notifications, |event| {
        matches!(event, SessionEvent::DeliveryChanged { .. })
    })
    .await;

    // then (期待する結果):
    assert_eq!(local_seq, seq(1));
    assert_eq!(pending.state(), DeliveryState::Pending);
    assert_eq!(sent, send_frame("bob", "hello", 1));
    assert_eq!(
        delivered,
        SessionEvent::DeliveryChanged {
            local_seq: seq(1),
            room_id: room("bob"),
            state: DeliveryState::Sent,
        }
    );
    assert!(session.outbound(local_seq).await.is_none());
    assert!(server.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_while_ready_goes_out_immediately() {
    // テスト項目: Ready 中の送信はすぐにフレームとして書き出される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;

    // when (操作):
    session.send(room("alice"), "now").await.unwrap();

    // then (期待する結果):
    assert_eq!(server.recv().await, send_frame("alice", "now", 1));
    let entry = session.outbound(seq(1)).await.unwrap();
    assert!(entry.is_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_queue_full_rejects_without_mutation() {
    // テスト項目: 上限まで詰めた後の enqueue は QueueFull を返し、キューは変化しない
    // given (前提条件):
    let (transport, _connections) = FakeTransport::new();
    let session =
        ChatSession::new(credentials("bob"), config().with_queue_capacity(2), transport);
    session.send(room("alice"), "one").await.unwrap();
    session.send(room("alice"), "two").await.unwrap();
    let before = session.outbound_entries().await;

    // when (操作):
    let result = session.send(room("alice"), "three").await;

    // then (期待する結果):
    assert_eq!(
        result,
        Err(SendMessageError::Queue(QueueError::QueueFull { capacity: 2 }))
    );
    assert_eq!(session.outbound_entries().await, before);

    // 空きができれば次の localSeq で受け付ける
    session.discard(seq(1)).await.unwrap();
    assert_eq!(session.send(room("alice"), "three").await, Ok(seq(3)));
}

#[tokio::test(start_paused = true)]
async fn test_empty_body_is_rejected() {
    // テスト項目: 空の本文は enqueue されない
    // given (前提条件):
    let (transport, _connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);

    // when (操作):
    let result = session.send(room("alice"), "").await;

    // then (期待する結果):
    assert!(matches!(result, Err(SendMessageError::InvalidBody(_))));
    assert!(session.outbound_entries().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unacked_send_fails_and_can_be_retried() {
    // テスト項目: ack が来ない送信は Failed になり、retry で同じ localSeq で再送される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut notifications = session.notifications();
    let mut server = connect_ready(&session, &mut connections).await;
    let local_seq = session.send(room("alice"), "anyone?").await.unwrap();
    assert_eq!(server.recv().await, send_frame("alice", "anyone?", 1));

    // when (操作):
    let failed = wait_for(&mut notifications, |event| {
        matches!(event, SessionEvent::DeliveryChanged { .. })
    })
    .await;
    let entry = session.outbound(local_seq).await.unwrap();
    session.retry(local_seq).await.unwrap();

    // then (期待する結果):
    assert_eq!(
        failed,
        SessionEvent::DeliveryChanged {
            local_seq,
            room_id: room("alice"),
            state: DeliveryState::Failed,
        }
    );
    assert_eq!(entry.state(), DeliveryState::Failed);
    assert_eq!(server.recv().await, send_frame("alice", "anyone?", 1));
}

#[tokio::test(start_paused = true)]
async fn test_unacked_messages_are_resent_after_reconnect() {
    // テスト項目: 送信済みで未 ack のメッセージは再接続後に同じ localSeq で再送される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;
    session.send(room("alice"), "first").await.unwrap();
    assert_eq!(server.recv().await, send_frame("alice", "first", 1));
    let mut notifications = session.notifications();

    // when (操作):
    drop(server);
    wait_for_state(&mut notifications, ConnectionState::Reconnecting).await;
    session.send(room("alice"), "second").await.unwrap();
    let mut server = accept_next(&mut connections).await;

    // then (期待する結果):
    assert_eq!(server.recv().await, send_frame("alice", "first", 1));
    assert_eq!(server.recv().await, send_frame("alice", "second", 2));
}

#[tokio::test(start_paused = true)]
async fn test_switching_rooms_leaves_before_joining() {
    // テスト項目: ルーム切り替えでは Leave{A} が Join{B} より先に送られる
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;
    session.open(room("alice")).await;
    assert_eq!(
        server.recv().await,
        WireEvent::Join {
            room_id: "alice".to_string()
        }
    );

    // when (操作):
    session.open(room("carol")).await;

    // then (期待する結果):
    assert_eq!(
        server.recv().await,
        WireEvent::Leave {
            room_id: "alice".to_string()
        }
    );
    assert_eq!(
        server.recv().await,
        WireEvent::Join {
            room_id: "carol".to_string()
        }
    );
    assert_eq!(session.active_room().await, Some(room("carol")));
}

#[tokio::test(start_paused = true)]
async fn test_active_room_is_rejoined_after_flush_on_reconnect() {
    // テスト項目: 再接続時はキューのフラッシュ後にアクティブルームへ Join し直す
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;
    session.open(room("alice")).await;
    server.recv().await;
    let mut notifications = session.notifications();

    // when (操作):
    drop(server);
    wait_for_state(&mut notifications, ConnectionState::Reconnecting).await;
    session.send(room("alice"), "back soon").await.unwrap();
    let mut server = accept_next(&mut connections).await;

    // then (期待する結果):
    assert_eq!(server.recv().await, send_frame("alice", "back soon", 1));
    assert_eq!(
        server.recv().await,
        WireEvent::Join {
            room_id: "alice".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_opening_room_offline_defers_join() {
    // テスト項目: 未接続中に開いたルームは Ready になってから Join される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    session.open(room("alice")).await;
    session.open(room("carol")).await;

    // when (操作):
    let mut server = connect_ready(&session, &mut connections).await;

    // then (期待する結果):
    assert_eq!(
        server.recv().await,
        WireEvent::Join {
            room_id: "carol".to_string()
        }
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(server.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_message_for_active_room_reaches_listener_without_unread() {
    // テスト項目: アクティブルーム "alice" へのメッセージはリスナーに届き、未読数は変わらない
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;
    session.open(room("alice")).await;
    server.recv().await;
    let received: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    session
        .subscribe(room("alice"), {
            let received = received.clone();
            move |message: &ChatMessage| {
                received.lock().unwrap().push((
                    message.sender.as_str().to_string(),
                    message.body.as_str().to_string(),
                ));
            }
        })
        .await;

    // when (操作):
    server.message("alice", "alice", "hi", 5);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // then (期待する結果):
    assert_eq!(
        *received.lock().unwrap(),
        vec![("alice".to_string(), "hi".to_string())]
    );
    let summary = session.summary(&room("alice")).await.unwrap();
    assert_eq!(summary.unread_count, 0);
    assert_eq!(summary.last_message, Some(MessageBody::new("hi").unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_and_stale_messages_are_dropped() {
    // テスト項目: 同じ seq や古い seq のメッセージはリスナーにも未読数にも反映されない
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let server = connect_ready(&session, &mut connections).await;
    let count = Arc::new(Mutex::new(0));
    session
        .subscribe(room("dave"), {
            let count = count.clone();
            move |_: &ChatMessage| *count.lock().unwrap() += 1
        })
        .await;

    // when (操作):
    server.message("dave", "dave", "hello", 5);
    server.message("dave", "dave", "hello", 5);
    server.message("dave", "dave", "older", 3);
    server.message("dave", "dave", "later", 9);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // then (期待する結果):
    assert_eq!(*count.lock().unwrap(), 2);
    let summary = session.summary(&room("dave")).await.unwrap();
    assert_eq!(summary.unread_count, 2);
    assert_eq!(summary.last_message, Some(MessageBody::new("later").unwrap()));
    let bodies: Vec<String> = session
        .history(&room("dave"))
        .await
        .into_iter()
        .map(|m| m.body.into_string())
        .collect();
    assert_eq!(bodies, vec!["hello".to_string(), "later".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_opening_room_clears_unread_count() {
    // テスト項目: 非アクティブルームの未読数は増え、ルームを開くと 0 になる
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let server = connect_ready(&session, &mut connections).await;
    server.message("erin", "erin", "ping", 1);
    server.message("erin", "erin", "ping again", 2);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.summary(&room("erin")).await.unwrap().unread_count, 2);

    // when (操作):
    session.open(room("erin")).await;

    // then (期待する結果):
    assert_eq!(session.summary(&room("erin")).await.unwrap().unread_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_is_surfaced_to_listeners() {
    // テスト項目: Ready 中のサーバーエラーは通知とイベントリスナーに届き、接続は維持される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport.clone());
    let mut notifications = session.notifications();
    let server = connect_ready(&session, &mut connections).await;
    let codes = Arc::new(Mutex::new(Vec::new()));
    session
        .subscribe_events(EventKind::ServerError, {
            let codes = codes.clone();
            move |event: &InboundEvent| {
                if let InboundEvent::Error { code, .. } = event {
                    codes.lock().unwrap().push(*code);
                }
            }
        })
        .await;

    // when (操作):
    server.push(WireEvent::Error {
        code: 429,
        message: "slow down".to_string(),
    });
    let event = wait_for(&mut notifications, |event| {
        matches!(event, SessionEvent::ServerError { .. })
    })
    .await;

    // then (期待する結果):
    assert_eq!(
        event,
        SessionEvent::ServerError {
            code: 429,
            message: "slow down".to_string(),
        }
    );
    assert_eq!(*codes.lock().unwrap(), vec![429]);
    assert_eq!(session.state().await, ConnectionState::Ready);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_and_heartbeat_reach_event_listeners() {
    // テスト項目: Authenticated と Heartbeat の種類別リスナーも呼び出される
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Authenticated, EventKind::Heartbeat] {
        let seen = seen.clone();
        session
            .subscribe_events(kind, move |event: &InboundEvent| {
                seen.lock().unwrap().push(event.clone());
            })
            .await;
    }

    // when (操作):
    let server = connect_ready(&session, &mut connections).await;
    server.push(WireEvent::Heartbeat);
    tokio::time::sleep(Duration::from_millis(1)).await;

    // then (期待する結果):
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2, "{seen:?}");
    assert!(matches!(
        &seen[0],
        InboundEvent::Authenticated { nickname } if nickname.as_str() == "bob"
    ));
    assert_eq!(seen[1], InboundEvent::Heartbeat);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_listener_receives_nothing() {
    // テスト項目: unsubscribe 後のリスナーには配送されない
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let server = connect_ready(&session, &mut connections).await;
    let count = Arc::new(Mutex::new(0));
    let handle = session
        .subscribe(room("alice"), {
            let count = count.clone();
            move |_: &ChatMessage| *count.lock().unwrap() += 1
        })
        .await;

    // when (操作):
    let removed = session.unsubscribe(handle).await;
    server.message("alice", "alice", "hi", 1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // then (期待する結果):
    assert!(removed);
    assert_eq!(*count.lock().unwrap(), 0);
    assert!(!session.unsubscribe(handle).await);
}

#[tokio::test(start_paused = true)]
async fn test_room_snapshot_merges_with_live_rooms() {
    // テスト項目: スナップショットは既存ルームを消さずにマージされる
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let server = connect_ready(&session, &mut connections).await;
    server.message("live", "live", "fresh", 1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut from_server = RoomSummary::new(room("archived"));
    from_server.unread_count = 4;

    // when (操作):
    let loaded = session
        .refresh_rooms(&StaticRoomList(vec![from_server]))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(loaded, 1);
    let ids: Vec<String> = session
        .summaries()
        .await
        .into_iter()
        .map(|summary| summary.room_id.into_string())
        .collect();
    assert_eq!(ids, vec!["live".to_string(), "archived".to_string()]);
    assert_eq!(session.summary(&room("archived")).await.unwrap().unread_count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_stale_snapshot_keeps_live_state_of_active_room() {
    // テスト項目: 古いスナップショットはライブで受信した最新メッセージを巻き戻さず、アクティブルームの未読も 0 のまま
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    let mut server = connect_ready(&session, &mut connections).await;
    session.open(room("alice")).await;
    server.recv().await;
    server.message("alice", "alice", "fresh", 10);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut stale = RoomSummary::new(room("alice"));
    stale.last_message = Some(MessageBody::new("old").unwrap());
    stale.last_message_time = Some(Timestamp::new(1));
    stale.unread_count = 3;
    let mut newer = RoomSummary::new(room("carol"));
    newer.last_message = Some(MessageBody::new("from server").unwrap());
    newer.last_message_time = Some(Timestamp::new(1_800_000_000_000));
    newer.unread_count = 2;

    // when (操作):
    session
        .refresh_rooms(&StaticRoomList(vec![stale, newer]))
        .await
        .unwrap();

    // then (期待する結果):
    let alice = session.summary(&room("alice")).await.unwrap();
    assert_eq!(alice.last_message, Some(MessageBody::new("fresh").unwrap()));
    assert_eq!(alice.last_message_time, Some(Timestamp::new(1_700_000_000_010)));
    assert_eq!(alice.unread_count, 0);
    assert_eq!(session.summary(&room("carol")).await.unwrap().unread_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_never_adds_unread_to_active_room() {
    // テスト項目: アクティブルームのスナップショット行が新しくても未読数は 0 のまま
    // given (前提条件):
    let (transport, _connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport);
    session.open(room("alice")).await;
    let mut row = RoomSummary::new(room("alice"));
    row.last_message = Some(MessageBody::new("while away").unwrap());
    row.last_message_time = Some(Timestamp::new(1_700_000_000_000));
    row.unread_count = 5;

    // when (操作):
    session.refresh_rooms(&StaticRoomList(vec![row])).await.unwrap();

    // then (期待する結果):
    let alice = session.summary(&room("alice")).await.unwrap();
    assert_eq!(alice.last_message, Some(MessageBody::new("while away").unwrap()));
    assert_eq!(alice.unread_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_store() {
    // テスト項目: ログアウトでストアが空になり、接続が閉じる
    // given (前提条件):
    let (transport, mut connections) = FakeTransport::new();
    let session = ChatSession::new(credentials("bob"), config(), transport.clone());
    let mut notifications = session.notifications();
    let server = connect_ready(&session, &mut connections).await;
    server.message("alice", "alice", "hi", 1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let repository = session.repository();
    assert_eq!(repository.list().await.len(), 1);

    // when (操作):
    session.logout().await;

    // then (期待する結果):
    assert!(repository.list().await.is_empty());
    wait_for_state(&mut notifications, ConnectionState::Disconnected).await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
}
