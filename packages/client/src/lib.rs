//! Tsunagi CLI chat client.
//!
//! A thin terminal front end over [`tsunagi_core::ChatSession`]: one line of input is
//! either a slash command or a message for the active room.

pub mod app;
pub mod args;
pub mod command;
pub mod error;

pub use app::run;
pub use args::Args;
pub use error::ClientError;
