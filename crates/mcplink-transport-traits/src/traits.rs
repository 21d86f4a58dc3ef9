//! Core transport trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

use crate::callbacks::CapabilityCallbacks;
use crate::error::TransportResult;
use crate::types::{TransportState, TransportType};

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// The core trait for all transport implementations.
///
/// A transport owns its channel, a background receive task, the table of
/// outstanding requests and the dispatcher for server-initiated requests.
/// Callers only see request/response pairs and fire-and-forget notifications.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Returns the current state of the transport.
    fn state(&self) -> TransportState;

    /// Returns `true` if the transport is currently in the `Connected` state.
    fn is_connected(&self) -> bool {
        matches!(self.state(), TransportState::Connected)
    }

    /// Attach the callbacks that answer server-initiated requests.
    ///
    /// Only allowed while disconnected; the receive loop works from the set
    /// attached when it started.
    fn attach_callbacks(&self, callbacks: CapabilityCallbacks) -> TransportResult<()>;

    /// Returns the attached callbacks.
    fn callbacks(&self) -> CapabilityCallbacks;

    /// Establish the channel and start the receive loop.
    fn connect(&self) -> TransportFuture<'_, ()>;

    /// Stop the receive loop, release the channel and fail every outstanding
    /// request with `ConnectionClosed`. Safe to call in any state.
    fn disconnect(&self) -> TransportFuture<'_, ()>;

    /// Send a request and wait for the response with the same id.
    fn send_request(&self, request: JsonRpcRequest) -> TransportFuture<'_, JsonRpcResponse>;

    /// Send a notification without waiting for anything.
    fn send_notification(&self, notification: JsonRpcNotification) -> TransportFuture<'_, ()>;

    /// Returns the endpoint address or command for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}
