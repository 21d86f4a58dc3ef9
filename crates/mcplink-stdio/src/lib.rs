//! # mcplink stdio transport
//!
//! Talks to an MCP server running as a child process. Messages are single
//! JSON objects terminated by `\n` on the child's stdin and stdout; the
//! child's stderr is forwarded to `tracing` under the
//! `mcplink_stdio::server_stderr` target so stdout stays pure JSON-RPC.
//!
//! - **Framing**: [`JsonLineCodec`] buffers partial lines, yields every
//!   complete line in a read, and never ends the stream on bad content
//! - **Launch**: [`LaunchSpec`] resolves the command, arguments and
//!   environment for the current [`Platform`]
//! - **Teardown**: closing stdin, waiting for exit, then killing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcplink_stdio::{StdioServerParams, StdioTransport};
//! use mcplink_transport_traits::Transport;
//!
//! # async fn run() -> Result<(), mcplink_transport_traits::TransportError> {
//! let params = StdioServerParams::new("uvx", ["mcp-server-time"]);
//! let transport = StdioTransport::new(params);
//! transport.connect().await?;
//! // ...
//! transport.disconnect().await?;
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

mod codec;
mod config;
mod env;
mod transport;

pub use codec::JsonLineCodec;
pub use config::StdioServerParams;
pub use env::{LaunchSpec, Platform, default_environment};
pub use transport::StdioTransport;

// Re-export common types for convenience
pub use mcplink_transport_traits::{
    Transport, TransportError, TransportResult, TransportState, TransportType,
};
