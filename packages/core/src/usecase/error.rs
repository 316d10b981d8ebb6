//! UseCase layer error definitions.

use thiserror::Error;

use crate::domain::{ConnectionState, QueueError, ValueObjectError};

/// The server rejected the session's credentials. Fatal: never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("authentication rejected ({code}): {message}")]
pub struct AuthError {
    pub code: u16,
    pub message: String,
}

/// Errors surfaced by `connect`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Fresh credentials are required before connecting again
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// `connect` is only valid from `Disconnected`
    #[error("session is already {0}")]
    AlreadyConnected(ConnectionState),

    /// `disconnect` or `logout` interrupted the attempt
    #[error("connect attempt was cancelled")]
    Cancelled,
}

/// Errors surfaced by `send`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    #[error("invalid message: {0}")]
    InvalidBody(#[from] ValueObjectError),

    /// Includes `QueueFull`; the caller should shed load (e.g. disable the send button)
    #[error(transparent)]
    Queue(#[from] QueueError),
}
