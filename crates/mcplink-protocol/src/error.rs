//! Errors raised while decoding wire messages.

use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// A wire message that could not be turned into a [`crate::JsonRpcMessage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageError {
    /// The payload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// The `jsonrpc` member is missing or not `"2.0"`.
    #[error("Invalid JSON-RPC version: {0}")]
    InvalidVersion(String),

    /// The JSON value matches none of the four message shapes, or more than one.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl MessageError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }
}

impl From<serde_json::Error> for MessageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
