//! Real-time chat session core.
//!
//! Keeps one logical connection per logged-in user, lets the UI move the active room
//! without reconnecting, delivers room messages in order and buffers sends while offline.
//!
//! Layers follow the usual split:
//!
//! - [`domain`]: value objects, entities, connection state and the store trait
//! - [`infrastructure`]: wire codec, transports, in-memory store, room list snapshot source
//! - [`usecase`]: outbound queue, message dispatcher, room session
//! - [`session`]: connection manager and the public [`ChatSession`] handle

pub mod domain;
pub mod infrastructure;
pub mod session;
pub mod usecase;

// Re-export entry points
pub use session::{ChatSession, SessionConfig, SessionEvent};
