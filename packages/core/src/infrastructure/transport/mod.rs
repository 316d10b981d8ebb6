//! Transport abstraction.
//!
//! The session core only needs a duplex stream of frames. The concrete transport is
//! injected; [`websocket::WebSocketTransport`] is the production implementation.

pub mod websocket;

use async_trait::async_trait;
use thiserror::Error;

pub use websocket::WebSocketTransport;

/// One transport-level unit carrying exactly one encoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Transport failures. Always retried via backoff unless the session was disconnected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to receive frame: {0}")]
    Receive(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("timed out while {0}")]
    Timeout(&'static str),

    #[error("corrupted stream: {0}")]
    Corrupted(String),
}

/// Writing half of a connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Reading half of a connection
#[async_trait]
pub trait FrameStream: Send {
    /// Next frame; `None` once the peer closed the connection
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// An established connection, split into its two halves
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

impl Link {
    pub fn new(sink: Box<dyn FrameSink>, stream: Box<dyn FrameStream>) -> Self {
        Self { sink, stream }
    }
}

/// Opens connections to the chat server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Link, TransportError>;
}
