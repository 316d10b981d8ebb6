//! WebSocket transport built on tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::{Frame, FrameSink, FrameStream, Link, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default time allowed for the TCP + WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to `ws://` endpoints
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<Link, TransportError> {
        let (socket, response) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| TransportError::Timeout("connecting"))?
            .map_err(|e| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            "WebSocket handshake with {} completed (status {})",
            endpoint,
            response.status()
        );

        let (sink, stream) = socket.split();
        Ok(Link::new(
            Box::new(WebSocketSink(sink)),
            Box::new(WebSocketFrames(stream)),
        ))
    }
}

struct WebSocketSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        };
        self.0
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WebSocketFrames(SplitStream<WsStream>);

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        while let Some(msg) = self.0.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Message::Ping(_) | Message::Pong(_) => {
                    // Ping/pong is handled automatically by the WebSocket protocol
                    tracing::trace!("Received ping/pong");
                }
                Message::Close(frame) => {
                    tracing::debug!("Server closed the WebSocket: {:?}", frame);
                    return None;
                }
                Message::Frame(_) => {}
            }
        }
        None
    }
}
