//! Shared utilities for Tsunagi.
//!
//! Logger setup and JST time helpers used by both the session core and the CLI client.

pub mod logger;
pub mod time;
