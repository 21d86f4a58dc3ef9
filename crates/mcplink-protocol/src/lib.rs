//! # mcplink protocol
//!
//! Wire-level building blocks for the mcplink MCP client runtime.
//!
//! ## What's Inside
//!
//! - **JSON-RPC**: [`JsonRpcMessage`], a four-variant envelope (request, response,
//!   error, notification) built by the validating factory
//!   [`JsonRpcMessage::from_value`]
//! - **Methods**: [`Method`], the closed set of protocol method names
//! - **Types**: typed params and results for every client operation
//!   (tools, resources, prompts, completion, logging, sampling, elicitation, roots)
//! - **Errors**: [`MessageError`] for malformed wire data and [`error_codes`]
//!
//! ## Example
//!
//! ```rust
//! use mcplink_protocol::{JsonRpcMessage, Method};
//!
//! let raw = r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#;
//! let message: JsonRpcMessage = raw.parse().unwrap();
//! assert!(message.is_request());
//! assert_eq!(message.method(), Some(Method::Ping.as_str()));
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod error;
pub mod jsonrpc;
pub mod method;
pub mod types;

pub use error::{MessageError, error_codes};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcVersion, RequestId,
};
pub use method::Method;

/// Protocol revision sent in the `initialize` request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Upper bound for a single framed message, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
