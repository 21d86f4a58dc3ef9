//! # mcplink transport traits
//!
//! The contract every mcplink transport implements, plus the pieces each of
//! them embeds instead of reimplementing:
//!
//! - **Traits**: [`Transport`] and [`MessageSink`]
//! - **Types**: [`TransportType`], [`TransportState`], [`TimeoutConfig`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Correlation**: [`PendingCalls`] maps outstanding request ids to one-shot
//!   completions and enforces the request timeout
//! - **Dispatch**: [`Dispatcher`] answers `sampling/createMessage`,
//!   `elicitation/create` and `roots/list` through [`CapabilityCallbacks`]
//! - **Routing**: [`InboundRouter`] classifies every inbound frame and sends it
//!   to the right place without ever blocking the receive loop
//! - **Shared state**: [`TransportCore`] bundles all of the above for a
//!   concrete transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcplink_transport_traits::{Transport, TransportCore, TransportFuture};
//!
//! #[derive(Debug)]
//! struct MyTransport {
//!     core: TransportCore,
//! }
//!
//! impl Transport for MyTransport {
//!     fn send_request(&self, request: JsonRpcRequest) -> TransportFuture<'_, JsonRpcResponse> {
//!         Box::pin(async move {
//!             self.core
//!                 .request(request, |wire| async move { /* write `wire` */ Ok(()) })
//!                 .await
//!         })
//!     }
//!     // ...
//! }
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

mod callbacks;
mod config;
mod correlation;
mod dispatch;
mod error;
mod router;
mod state;
mod traits;
mod types;

pub use callbacks::{
    CallbackError, CallbackResult, CapabilityCallbacks, ElicitationCallback, ListRootsCallback,
    LoggingCallback, SamplingCallback,
};
pub use config::TimeoutConfig;
pub use correlation::PendingCalls;
pub use dispatch::{DispatchError, Dispatcher};
pub use error::{TransportError, TransportResult};
pub use router::{InboundRouter, MessageSink, Routed};
pub use state::TransportCore;
pub use traits::{Transport, TransportFuture};
pub use types::{TransportState, TransportType};
