//! Interactive session loop.

use std::{sync::Arc, thread};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{broadcast, mpsc};
use tsunagi_core::{
    ChatSession, SessionConfig, SessionEvent,
    domain::{
        AuthToken, ConnectionState, Credentials, DeliveryState, EventKind, InboundEvent,
        LocalSeq, Nickname, RoomId,
    },
    infrastructure::{HttpRoomListSource, WebSocketTransport},
    usecase::ConnectError,
};
use tsunagi_shared::time::format_jst_clock;

use crate::{
    args::Args,
    command::{Command, HELP},
    error::ClientError,
};

/// Run the client until `/quit`, end of input or an authentication rejection
pub async fn run(args: Args) -> Result<(), ClientError> {
    let credentials = Credentials::new(AuthToken::new(args.token)?, Nickname::new(args.nickname)?);
    let initial_room = args.room.map(RoomId::new).transpose()?;
    let rooms = args.rooms_url.map(HttpRoomListSource::new);

    let session = Arc::new(ChatSession::new(
        credentials,
        SessionConfig::new(args.url),
        Arc::new(WebSocketTransport::new()),
    ));
    let printer = tokio::spawn(print_notifications(session.notifications()));
    session
        .subscribe_events(EventKind::Message, print_message)
        .await;

    // The prompt stays usable while offline; sends are queued until Ready.
    let mut connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect().await }
    });
    let mut connect_settled = false;

    if let Some(source) = &rooms {
        if let Err(e) = session.refresh_rooms(source).await {
            tracing::warn!("Could not load the room list: {}", e);
        }
    }
    if let Some(room_id) = initial_room {
        session.open(room_id).await;
    }

    let (line_tx, mut lines) = mpsc::channel::<String>(16);
    // Plain thread: a blocked readline must not hold up runtime shutdown
    thread::spawn(move || {
        if let Err(e) = read_lines(line_tx) {
            tracing::error!("Input error: {}", e);
        }
    });

    println!("Type /help for commands.");
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let command = Command::parse(&line);
                if command == Command::Quit {
                    break;
                }
                execute(&session, rooms.as_ref(), command).await;
            }
            result = &mut connecting, if !connect_settled => {
                connect_settled = true;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e @ ConnectError::Auth(_))) => {
                        outcome = Err(e.into());
                        break;
                    }
                    Ok(Err(e)) => tracing::error!("Could not connect: {}", e),
                    Err(e) => tracing::error!("Connect task failed: {}", e),
                }
            }
        }
    }

    if !connect_settled {
        connecting.abort();
        let _ = connecting.await;
    }
    match Arc::try_unwrap(session) {
        Ok(session) => session.logout().await,
        Err(session) => session.disconnect().await,
    }
    printer.abort();
    println!("Bye.");
    outcome
}

fn read_lines(lines: mpsc::Sender<String>) -> Result<(), ClientError> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if lines.blocking_send(line.to_string()).is_err() {
                    return Ok(());
                }
            }
            Err(ReadlineError::Interrupted) => println!("CTRL-C detected. Type /quit to exit."),
            Err(ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn execute(session: &ChatSession, rooms: Option<&HttpRoomListSource>, command: Command) {
    match command {
        Command::Say(text) => {
            let Some(room_id) = session.active_room().await else {
                println!("No active room, /open one first.");
                return;
            };
            match session.send(room_id, text).await {
                Ok(local_seq) if session.state().await != ConnectionState::Ready => {
                    println!("(#{local_seq} queued until the connection is back)");
                }
                Ok(_) => {}
                Err(e) => println!("Not sent: {e}"),
            }
        }
        Command::Open(room) => match RoomId::new(room) {
            Ok(room_id) => {
                session.open(room_id.clone()).await;
                for message in session.history(&room_id).await {
                    println!(
                        "[{}] {} {}: {}",
                        room_id,
                        format_jst_clock(message.sent_at.value()),
                        message.sender,
                        message.body
                    );
                }
            }
            Err(e) => println!("{e}"),
        },
        Command::Close => session.close().await,
        Command::Rooms => {
            if let Some(source) = rooms {
                if let Err(e) = session.refresh_rooms(source).await {
                    println!("Could not refresh the room list: {e}");
                }
            }
            let summaries = session.summaries().await;
            if summaries.is_empty() {
                println!("No rooms yet.");
            }
            for summary in summaries {
                let time = summary
                    .last_message_time
                    .map(|t| format_jst_clock(t.value()))
                    .unwrap_or_else(|| "--:--".to_string());
                let last = summary
                    .last_message
                    .as_ref()
                    .map(|body| body.as_str())
                    .unwrap_or("");
                println!(
                    "{:<20} {:>3} unread  {}  {}",
                    summary.room_id, summary.unread_count, time, last
                );
            }
        }
        Command::History => match session.active_room().await {
            Some(room_id) => {
                for message in session.history(&room_id).await {
                    println!(
                        "{} {}: {}",
                        format_jst_clock(message.sent_at.value()),
                        message.sender,
                        message.body
                    );
                }
            }
            None => println!("No active room."),
        },
        Command::Queue => {
            let entries = session.outbound_entries().await;
            if entries.is_empty() {
                println!("Nothing queued.");
            }
            for entry in entries {
                println!(
                    "#{:<4} {:<8} {:<16} {}",
                    entry.local_seq,
                    delivery_label(entry.state()),
                    entry.message.room_id,
                    entry.message.body
                );
            }
        }
        Command::Retry(value) => match LocalSeq::new(value) {
            Ok(local_seq) => {
                if let Err(e) = session.retry(local_seq).await {
                    println!("{e}");
                }
            }
            Err(e) => println!("{e}"),
        },
        Command::Discard(value) => match LocalSeq::new(value) {
            Ok(local_seq) => match session.discard(local_seq).await {
                Ok(entry) => println!("Discarded #{}", entry.local_seq),
                Err(e) => println!("{e}"),
            },
            Err(e) => println!("{e}"),
        },
        Command::Status => {
            let room = session
                .active_room()
                .await
                .map(|room_id| room_id.into_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{} (room: {})", session.state().await, room);
        }
        Command::Help => println!("{HELP}"),
        Command::Invalid(hint) => println!("{hint}"),
        Command::Quit => {}
    }
}

fn print_message(event: &InboundEvent) {
    if let InboundEvent::MessageReceived(message) = event {
        println!(
            "[{}] {} {}: {}",
            message.room_id,
            format_jst_clock(message.sent_at.value()),
            message.sender,
            message.body
        );
    }
}

fn delivery_label(state: DeliveryState) -> &'static str {
    match state {
        DeliveryState::Pending => "pending",
        DeliveryState::Sent => "sent",
        DeliveryState::Failed => "failed",
    }
}

async fn print_notifications(mut notifications: broadcast::Receiver<SessionEvent>) {
    loop {
        match notifications.recv().await {
            Ok(SessionEvent::StateChanged(state)) => println!("-- {state}"),
            Ok(SessionEvent::DeliveryChanged {
                local_seq,
                room_id,
                state: DeliveryState::Failed,
            }) => {
                println!("-- #{local_seq} to {room_id} was not acknowledged, /retry {local_seq}");
            }
            Ok(SessionEvent::DeliveryChanged { .. }) => {}
            Ok(SessionEvent::AuthRejected(e)) => {
                println!("-- {e}; restart with a valid token");
            }
            Ok(SessionEvent::ServerError { code, message }) => {
                println!("-- server error {code}: {message}");
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("Missed {} notifications", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
