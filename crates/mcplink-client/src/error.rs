//! Client error type.

use mcplink_transport_traits::TransportError;
use thiserror::Error;

use crate::session::SessionState;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from sessions, server configuration and the registry.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The transport failed, timed out, or the server answered with an error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A server entry matches no transport
    #[error("Invalid server config for '{name}': {reason}")]
    InvalidServerConfig {
        /// Server name, or `<unnamed>`
        name: String,
        /// What is missing or wrong
        reason: String,
    },

    /// The session is not in a state that allows the operation
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        /// Operation that was refused
        operation: &'static str,
        /// State the session was in
        state: SessionState,
    },

    /// The server's result did not have the expected shape
    #[error("Invalid response to '{method}': {reason}")]
    InvalidResponse {
        /// Method that was called
        method: String,
        /// Deserialization failure
        reason: String,
    },

    /// No server of that name is configured
    #[error("Server '{0}' not found")]
    UnknownServer(String),

    /// The server is configured but has no open session
    #[error("No session open for '{0}'")]
    NoSession(String),

    /// The registry has no servers at all
    #[error("No MCP servers configured")]
    NoServers,

    /// Reading, writing or parsing a config file failed
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// `true` when a request ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// JSON-RPC error code, when the server answered with an error envelope
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            Self::Transport(e) => e.rpc_code(),
            _ => None,
        }
    }

    pub(crate) fn invalid_config(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidServerConfig {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
