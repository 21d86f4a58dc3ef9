//! # mcplink-client
//!
//! Sessions with MCP servers over any mcplink transport, plus a registry of
//! named servers loaded from the common `{"mcpServers": {...}}` config file.
//!
//! ## Single session
//!
//! ```rust,no_run
//! use mcplink_client::Session;
//! use mcplink_protocol::types::Implementation;
//! use mcplink_stdio::{StdioServerParams, StdioTransport};
//!
//! # async fn example() -> mcplink_client::Result<()> {
//! let transport = StdioTransport::new(StdioServerParams::new("python", ["calc.py"]));
//! let session = Session::new(transport, Implementation::new("my-app", "1.0.0"));
//! session.connect().await?;
//! session.initialize().await?;
//!
//! let args = serde_json::json!({"a": 10, "b": 20});
//! let result = session.call_tool("add", args.as_object().cloned()).await?;
//! println!("{}", result.text());
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Server selection
//!
//! A config entry with `command` and `args` launches a subprocess; otherwise
//! its `url` picks SSE (contains `sse`) or streamable HTTP (contains `mcp`).
//! See [`ServerEntry::classify`].

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

pub mod config;
pub mod error;
pub mod registry;
pub mod session;

pub use config::{ClientConfig, ServerConfig, ServerEntry};
pub use error::{Error, Result};
pub use registry::{DEFAULT_CLIENT_NAME, DEFAULT_CLIENT_VERSION, McpClient, ServerMetadata};
pub use session::{Session, SessionState};

pub use mcplink_transport_traits::{
    CallbackError, CallbackResult, CapabilityCallbacks, ElicitationCallback, ListRootsCallback,
    LoggingCallback, SamplingCallback, TimeoutConfig, Transport, TransportError,
};
