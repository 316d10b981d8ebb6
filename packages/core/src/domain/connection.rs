//! Connection lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the session's single logical connection.
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> Ready -> Reconnecting -> Connecting ...
/// ```
///
/// Any state may move to `Disconnected` (explicit disconnect, logout or auth rejection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Authenticating | Reconnecting) => true,
            (Authenticating, Ready | Reconnecting) => true,
            (Ready, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
