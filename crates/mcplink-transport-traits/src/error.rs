//! Transport error types.

use std::time::Duration;

use mcplink_protocol::{JsonRpcError, MessageError};
use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The channel closed while the call was outstanding, or before it started.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// A notification was sent on a channel that is not open.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Failed to write a message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// No response arrived in time.
    #[error("Request '{method}' timed out after {timeout:?}")]
    RequestTimeout {
        /// Method of the request
        method: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// The peer answered with a JSON-RPC error envelope.
    #[error("Server returned error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// Error message
        message: String,
        /// Additional error data
        data: Option<Value>,
    },

    /// An inbound frame could not be classified.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// The transport was configured with invalid parameters, or reconfigured too late.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// `true` for [`TransportError::RequestTimeout`]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// `true` when the channel is gone
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_) | Self::Unavailable(_))
    }

    /// JSON-RPC code of a peer error
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<MessageError> for TransportError {
    fn from(err: MessageError) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<JsonRpcError> for TransportError {
    fn from(err: JsonRpcError) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rpc_error_conversion() {
        let err = TransportError::from(JsonRpcError::method_not_found("tools/nope"));
        assert_eq!(err.rpc_code(), Some(-32601));
        assert_eq!(
            err.to_string(),
            "Server returned error -32601: Method not found: tools/nope"
        );
    }

    #[test]
    fn test_classification_helpers() {
        let timeout = TransportError::RequestTimeout {
            method: "ping".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_closed());
        assert!(TransportError::ConnectionClosed("eof".into()).is_closed());
        assert_eq!(TransportError::Io("x".into()).rpc_code(), None);
    }
}
