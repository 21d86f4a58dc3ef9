//! Connection bookkeeping shared by the concrete transports.

use std::future::Future;
use std::sync::Arc;

use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::callbacks::CapabilityCallbacks;
use crate::config::TimeoutConfig;
use crate::correlation::PendingCalls;
use crate::dispatch::Dispatcher;
use crate::error::{TransportError, TransportResult};
use crate::router::{InboundRouter, MessageSink};
use crate::types::{TransportState, TransportType};

/// State, callbacks and pending calls of one transport.
#[derive(Debug)]
pub struct TransportCore {
    transport_type: TransportType,
    timeouts: TimeoutConfig,
    state: RwLock<TransportState>,
    callbacks: RwLock<CapabilityCallbacks>,
    pending: Arc<PendingCalls>,
}

impl TransportCore {
    /// Disconnected core for a transport of `transport_type`
    pub fn new(transport_type: TransportType, timeouts: TimeoutConfig) -> Self {
        Self {
            transport_type,
            timeouts,
            state: RwLock::new(TransportState::Disconnected),
            callbacks: RwLock::new(CapabilityCallbacks::default()),
            pending: Arc::new(PendingCalls::new()),
        }
    }

    /// Transport kind
    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    /// Configured timeouts
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.state.read().clone()
    }

    /// Replace the state
    pub fn set_state(&self, state: TransportState) {
        debug!(transport = %self.transport_type, %state, "Transport state change");
        *self.state.write() = state;
    }

    /// `true` while connected
    pub fn is_connected(&self) -> bool {
        matches!(*self.state.read(), TransportState::Connected)
    }

    /// Outstanding requests
    pub fn pending(&self) -> &Arc<PendingCalls> {
        &self.pending
    }

    /// Replace the callbacks. Rejected once a connection is underway.
    pub fn attach_callbacks(&self, callbacks: CapabilityCallbacks) -> TransportResult<()> {
        let state = self.state.read();
        if matches!(
            *state,
            TransportState::Connecting | TransportState::Connected
        ) {
            return Err(TransportError::ConfigurationError(format!(
                "callbacks must be attached before connect (transport is {state})"
            )));
        }
        *self.callbacks.write() = callbacks;
        Ok(())
    }

    /// Attached callbacks
    pub fn callbacks(&self) -> CapabilityCallbacks {
        self.callbacks.read().clone()
    }

    /// Move to `Connecting` and accept new requests again.
    ///
    /// Fails if a connection is already open or opening.
    pub fn begin_connect(&self) -> TransportResult<()> {
        let mut state = self.state.write();
        if matches!(
            *state,
            TransportState::Connecting | TransportState::Connected
        ) {
            return Err(TransportError::ConnectionFailed(format!(
                "transport is already {state}"
            )));
        }
        *state = TransportState::Connecting;
        self.pending.reopen();
        Ok(())
    }

    /// Move from `Connecting` to `Connected`.
    ///
    /// Fails if the receive side already died while the connection was
    /// being set up.
    pub fn finish_connect(&self) -> TransportResult<()> {
        let mut state = self.state.write();
        match &*state {
            TransportState::Connecting => {
                *state = TransportState::Connected;
                debug!(transport = %self.transport_type, "Transport connected");
                Ok(())
            }
            other => Err(TransportError::ConnectionFailed(format!(
                "connection lost during setup ({other})"
            ))),
        }
    }

    /// Router for a new connection, over the callbacks attached right now
    pub fn router(&self, sink: Arc<dyn MessageSink>) -> InboundRouter {
        InboundRouter::new(
            Arc::clone(&self.pending),
            Dispatcher::new(self.callbacks()),
            sink,
        )
    }

    /// The receive side ended on its own (EOF, stream error).
    ///
    /// Fails every outstanding call and marks the transport failed unless a
    /// disconnect is already in progress.
    pub fn connection_lost(&self, reason: &str) {
        self.pending.cancel_all(reason);
        let mut state = self.state.write();
        if matches!(*state, TransportState::Connected | TransportState::Connecting) {
            *state = TransportState::Failed {
                reason: reason.to_string(),
            };
        }
    }

    /// First step of `disconnect()`: move to `Disconnecting` and fail every
    /// outstanding call before any teardown that may block.
    pub fn begin_disconnect(&self) {
        if !matches!(self.state(), TransportState::Disconnected) {
            self.set_state(TransportState::Disconnecting);
        }
        self.pending.cancel_all("transport disconnected");
    }

    /// Final step of `disconnect()`: fail outstanding calls, mark disconnected.
    pub fn finish_disconnect(&self) {
        self.pending.cancel_all("transport disconnected");
        self.set_state(TransportState::Disconnected);
    }

    /// Serialize `request`, hand the line to `transmit` and await the reply.
    pub async fn request<F, Fut>(
        &self,
        request: JsonRpcRequest,
        transmit: F,
    ) -> TransportResult<JsonRpcResponse>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = TransportResult<()>>,
    {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed(format!(
                "transport is {}",
                self.state()
            )));
        }
        let wire = encode(&request)?;
        self.pending
            .exchange(&request, self.timeouts.request, transmit(wire))
            .await
    }

    /// Serialize `notification` after checking the channel is open.
    pub fn notification_wire(&self, notification: &JsonRpcNotification) -> TransportResult<String> {
        if !self.is_connected() {
            return Err(TransportError::Unavailable(format!(
                "cannot send '{}' while transport is {}",
                notification.method,
                self.state()
            )));
        }
        encode(notification)
    }
}

/// Single-line JSON encoding of an outbound message.
pub(crate) fn encode<T: Serialize>(message: &T) -> TransportResult<String> {
    Ok(serde_json::to_string(message)?)
}
