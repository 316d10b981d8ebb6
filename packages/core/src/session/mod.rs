//! Session layer.
//!
//! Owns the connection lifecycle and exposes the chat session to UI collaborators.
//! All session state sits behind one lock (`SessionCore`); the connection
//! manager task drives every connection transition except the ones made by `connect`
//! and `disconnect`.

pub mod backoff;
mod chat_session;
pub mod config;
mod connection;
mod state;
pub mod notification;

pub use backoff::Backoff;
pub use chat_session::ChatSession;
pub use config::{BackoffConfig, SessionConfig};
pub use notification::SessionEvent;
