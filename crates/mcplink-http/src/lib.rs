//! # mcplink HTTP transports
//!
//! Client transports for MCP servers reachable over HTTP:
//!
//! - [`SseTransport`]: the HTTP+SSE pairing. A GET event stream announces a
//!   message endpoint; requests are POSTed there and answered on the stream.
//! - [`StreamableHttpTransport`]: one endpoint taking POSTs that answer with
//!   JSON or SSE, plus an optional GET stream for server-initiated traffic,
//!   with `mcp-session-id` and `mcp-protocol-version` echoed once known.
//!
//! Both share the correlation engine and peer-request dispatch of
//! `mcplink-transport-traits`, so callers see the same [`Transport`]
//! contract as the subprocess transport.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcplink_http::{StreamableHttpConfig, StreamableHttpTransport};
//! use mcplink_transport_traits::Transport;
//!
//! # async fn run() -> Result<(), mcplink_transport_traits::TransportError> {
//! let config = StreamableHttpConfig::new("http://localhost:8000/mcp")
//!     .with_header("Authorization", "Bearer token");
//! let transport = StreamableHttpTransport::new(config)?;
//! transport.connect().await?;
//! # Ok(())
//! # }
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

mod channel;
mod retry;
mod sse;
mod sse_transport;
mod streamable;

pub use channel::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
pub use retry::RetryPolicy;
pub use sse::{SseDecoder, SseEvent};
pub use sse_transport::{SseConfig, SseTransport};
pub use streamable::{StreamableHttpConfig, StreamableHttpTransport};

// Re-export common types for convenience
pub use mcplink_transport_traits::{
    TimeoutConfig, Transport, TransportError, TransportResult, TransportState, TransportType,
};
