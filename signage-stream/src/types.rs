//! Core types for the signage-stream crate.

use serde::{Deserialize, Serialize};
use signage_model::{FullState, InboundMessage, OutboundMessage};

/// Status of the logical channel to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    /// Push updates are authoritative
    pub fn is_live(self) -> bool {
        self == ConnectionStatus::Connected
    }

    /// Fallback polling is active
    pub fn is_degraded(self) -> bool {
        matches!(self, ConnectionStatus::Disconnected | ConnectionStatus::Error)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Everything the supervisor reports to the owning display session
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The channel changed status
    Status(ConnectionStatus),
    /// A frame arrived on the push channel
    Message(InboundMessage),
    /// A fallback poll returned state
    Polled(FullState),
    /// A fallback poll got no response at all
    PollFailed {
        /// Set for the first poll after the channel went down
        first_since_disconnect: bool,
    },
    /// An explicitly requested pull returned state
    Refreshed(FullState),
}

/// Requests from the session to its supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorCommand {
    /// Best-effort send on the push channel
    Send(OutboundMessage),
    /// Pull full state now, regardless of channel status
    Refresh,
}
