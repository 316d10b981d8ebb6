//! Connection manager.
//!
//! One task per `connect` call drives the lifecycle
//! `Connecting -> Authenticating -> Ready`, falling back to `Reconnecting` with
//! exponential backoff whenever the link fails. The task ends on `disconnect`, on an
//! authentication rejection, or when the session is dropped.

use std::{future, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ConnectionState, InboundEvent, OutboundEvent},
    infrastructure::{
        Frame, FrameSink, Link, TransportError,
        codec::{decode_inbound, encode_outbound},
    },
    usecase::{AuthError, ConnectError},
};

use super::{backoff::Backoff, notification::SessionEvent, state::SessionShared};

pub(crate) type ConnectOutcome = oneshot::Sender<Result<(), ConnectError>>;

/// Why an attempt did not reach `Ready`
enum AttemptError {
    Transport(TransportError),
    Rejected(AuthError),
}

impl From<TransportError> for AttemptError {
    fn from(error: TransportError) -> Self {
        AttemptError::Transport(error)
    }
}

/// Aborts the writer task when the link is torn down
struct WriterTask(JoinHandle<TransportError>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) struct ConnectionManager {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    backoff: Backoff,
    /// Resolves the pending `connect` call on the first `Ready` or rejection
    outcome: Option<ConnectOutcome>,
}

impl ConnectionManager {
    pub(crate) fn spawn(
        shared: Arc<SessionShared>,
        cancel: CancellationToken,
        outcome: ConnectOutcome,
    ) {
        let backoff = Backoff::new(shared.config.backoff.clone());
        let manager = Self {
            shared,
            cancel,
            backoff,
            outcome: Some(outcome),
        };
        tokio::spawn(manager.run());
    }

    async fn run(mut self) {
        let cancel = self.cancel.clone();

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.attempt() => result,
            };

            match attempt {
                Ok((link, authenticated)) => {
                    self.backoff.reset();
                    let reason = tokio::select! {
                        _ = cancel.cancelled() => break,
                        reason = self.serve(link, authenticated) => reason,
                    };
                    tracing::warn!("Connection lost: {}", reason);
                }
                Err(AttemptError::Rejected(error)) => {
                    self.reject(error).await;
                    return;
                }
                Err(AttemptError::Transport(error)) => {
                    tracing::warn!("Connect attempt failed: {}", error);
                }
            }

            if !self.enter_reconnecting().await {
                break;
            }
            let delay = self.backoff.next_delay();
            tracing::info!(
                "Reconnecting in {:?} (attempt {})",
                delay,
                self.backoff.attempt()
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!("Connection manager stopped");
    }

    /// Transition under the lock unless `disconnect` already won
    async fn set_state(&self, next: ConnectionState) -> bool {
        let mut core = self.shared.core.lock().await;
        if self.cancel.is_cancelled() {
            return false;
        }
        core.transition(next)
    }

    /// Connect, then authenticate within `auth_timeout`.
    ///
    /// Returns the link together with the server's `Authenticated` event.
    async fn attempt(&self) -> Result<(Link, InboundEvent), AttemptError> {
        if !self.set_state(ConnectionState::Connecting).await {
            return Err(TransportError::Closed.into());
        }
        let config = &self.shared.config;
        tracing::info!("Connecting to {}", config.endpoint);
        let mut link = self.shared.transport.connect(&config.endpoint).await?;

        let credentials = {
            let mut core = self.shared.core.lock().await;
            if self.cancel.is_cancelled() || !core.transition(ConnectionState::Authenticating) {
                return Err(TransportError::Closed.into());
            }
            core.credentials.clone()
        };
        let frame = encode_outbound(OutboundEvent::Auth(credentials))
            .map_err(|e| TransportError::Send(e.to_string()))?;
        link.sink.send(frame).await?;

        match tokio::time::timeout(config.auth_timeout, await_authenticated(&mut link)).await {
            Ok(result) => result.map(|authenticated| (link, authenticated)),
            Err(_) => Err(TransportError::Timeout("waiting for authentication").into()),
        }
    }

    /// Run a `Ready` link until it fails; returns the reason
    async fn serve(&mut self, link: Link, authenticated: InboundEvent) -> TransportError {
        let Link { sink, mut stream } = link;
        let shared = self.shared.clone();
        let config = &shared.config;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut writer = WriterTask(tokio::spawn(write_frames(sink, rx)));

        let transmitted = {
            let mut core = self.shared.core.lock().await;
            if self.cancel.is_cancelled() {
                return TransportError::Closed;
            }
            core.enter_ready(tx, Instant::now());
            core.handle_inbound(authenticated).await;
            core.transmitted_signal()
        };
        if let Some(outcome) = self.outcome.take() {
            let _ = outcome.send(Ok(()));
        }

        let stale_after = config.stale_after();
        let mut last_seen = Instant::now();
        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + config.heartbeat_interval,
            config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let send_deadline = self
                .shared
                .core
                .lock()
                .await
                .queue
                .next_deadline(config.send_timeout);

            tokio::select! {
                frame = stream.next_frame() => match frame {
                    Some(Ok(frame)) => {
                        last_seen = Instant::now();
                        if let Err(error) = self.receive(frame).await {
                            return error;
                        }
                    }
                    Some(Err(error)) => return error,
                    None => return TransportError::Closed,
                },
                _ = heartbeat.tick() => {
                    let core = self.shared.core.lock().await;
                    if self.cancel.is_cancelled() {
                        return TransportError::Closed;
                    }
                    tracing::trace!("Sending heartbeat");
                    core.write([OutboundEvent::Heartbeat]);
                }
                _ = tokio::time::sleep_until(last_seen + stale_after) => {
                    return TransportError::Timeout("waiting for server traffic");
                }
                _ = sleep_until_some(send_deadline) => {
                    let mut core = self.shared.core.lock().await;
                    if self.cancel.is_cancelled() {
                        return TransportError::Closed;
                    }
                    core.expire_sends(Instant::now(), config.send_timeout);
                }
                _ = transmitted.notified() => {}
                result = &mut writer.0 => {
                    return result.unwrap_or_else(|e| TransportError::Send(e.to_string()));
                }
            }
        }
    }

    /// Decode and route one frame; framing errors end the link
    async fn receive(&self, frame: Frame) -> Result<(), TransportError> {
        match decode_inbound(&frame) {
            Ok(event) => {
                let mut core = self.shared.core.lock().await;
                if !self.cancel.is_cancelled() {
                    core.handle_inbound(event).await;
                }
                Ok(())
            }
            Err(error) if error.is_fatal_to_connection() => {
                Err(TransportError::Corrupted(error.to_string()))
            }
            Err(error) => {
                tracing::warn!("Dropping undecodable frame: {}", error);
                Ok(())
            }
        }
    }

    async fn enter_reconnecting(&self) -> bool {
        let mut core = self.shared.core.lock().await;
        if self.cancel.is_cancelled() {
            return false;
        }
        core.link_lost();
        core.transition(ConnectionState::Reconnecting)
    }

    /// Credentials were refused: stop for good until fresh ones are supplied
    async fn reject(&mut self, error: AuthError) {
        let mut core = self.shared.core.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::error!("Authentication rejected: {}", error);
        core.link_lost();
        core.transition(ConnectionState::Disconnected);
        core.notify(SessionEvent::AuthRejected(error.clone()));
        if let Some(outcome) = self.outcome.take() {
            let _ = outcome.send(Err(ConnectError::Auth(error)));
        }
    }
}

/// Wait for the server's verdict on the `Auth` frame
async fn await_authenticated(link: &mut Link) -> Result<InboundEvent, AttemptError> {
    loop {
        let frame = match link.stream.next_frame().await {
            Some(Ok(frame)) => frame,
            Some(Err(error)) => return Err(error.into()),
            None => return Err(TransportError::Closed.into()),
        };
        match decode_inbound(&frame) {
            Ok(InboundEvent::Authenticated { nickname }) => {
                tracing::info!("Authenticated as {}", nickname);
                return Ok(InboundEvent::Authenticated { nickname });
            }
            Ok(InboundEvent::Error { code, message }) => {
                return Err(AttemptError::Rejected(AuthError { code, message }));
            }
            Ok(other) => {
                tracing::debug!("Ignoring {:?} before authentication", other.kind());
            }
            Err(error) if error.is_fatal_to_connection() => {
                return Err(TransportError::Corrupted(error.to_string()).into());
            }
            Err(error) => tracing::warn!("Dropping undecodable frame: {}", error),
        }
    }
}

/// Writer half: encodes queued events in order and puts them on the wire
async fn write_frames(
    mut sink: Box<dyn FrameSink>,
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
) -> TransportError {
    while let Some(event) = rx.recv().await {
        let frame = match encode_outbound(event) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!("Failed to encode outbound event: {}", error);
                continue;
            }
        };
        if let Err(error) = sink.send(frame).await {
            return error;
        }
    }
    if let Err(error) = sink.close().await {
        tracing::debug!("Failed to close connection cleanly: {}", error);
    }
    TransportError::Closed
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending::<()>().await,
    }
}
