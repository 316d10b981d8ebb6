//! Command line arguments.

use clap::Parser;

/// Terminal chat client for a Tsunagi server
#[derive(Debug, Clone, Parser)]
#[command(name = "tsunagi-client", version, about)]
pub struct Args {
    /// WebSocket endpoint of the chat server
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// Auth token sent in the handshake
    #[arg(short, long)]
    pub token: String,

    /// Display name
    #[arg(short, long)]
    pub nickname: String,

    /// Base URL of the HTTP API serving `/api/rooms`
    #[arg(long)]
    pub rooms_url: Option<String>,

    /// Room to open after connecting
    #[arg(short, long)]
    pub room: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
