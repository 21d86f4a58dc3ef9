//! Core transport types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three channels a server can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Child process speaking newline-delimited JSON on stdin/stdout.
    Stdio,
    /// Server-Sent Events stream plus a POST endpoint announced on it.
    Sse,
    /// Streamable HTTP: POST outbound, optional streaming GET inbound.
    StreamableHttp,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable_http",
        })
    }
}

/// Where a transport is in its connect/disconnect cycle.
///
/// `Failed` is entered when the channel dies underneath a connected
/// transport (EOF, stream error) or when `connect` gives up. Only
/// `Connected` accepts requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    /// Idle; `connect` may be called
    #[default]
    Disconnected,
    /// `connect` in progress
    Connecting,
    /// Receive loop running
    Connected,
    /// `disconnect` in progress
    Disconnecting,
    /// The channel is gone
    Failed {
        /// Why
        reason: String,
    },
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Failed { reason } => return write!(f, "failed: {reason}"),
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(TransportType::StreamableHttp.to_string(), "streamable_http");
        assert_eq!(
            TransportState::Failed {
                reason: "eof".into()
            }
            .to_string(),
            "failed: eof"
        );
        assert_eq!(TransportState::default(), TransportState::Disconnected);
    }
}
