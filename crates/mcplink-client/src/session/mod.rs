//! One protocol session over one transport.
//!
//! ```text
//! Unconnected --connect--> Connected --initialize--> Initialized
//!      \                        \                        |
//!       `--------shutdown--------`-------shutdown--------`--> Closed
//! ```
//!
//! `initialize` advertises the client capabilities implied by the callbacks
//! attached to the transport, stores the server's [`InitializeResult`] and
//! sends `notifications/initialized`. Every other operation needs an
//! initialized session and fails with [`Error::InvalidState`] otherwise.
//!
//! All operations take `&self`; concurrent calls on one session are matched
//! to their responses by request id.

mod prompts;
mod resources;
mod tools;
mod utility;

use std::fmt;
use std::sync::OnceLock;

use mcplink_protocol::types::{
    Implementation, InitializeRequest, InitializeResult, ServerCapabilities,
};
use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, Method, PROTOCOL_VERSION};
use mcplink_transport_traits::{CapabilityCallbacks, Transport, TransportError};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Transport not connected yet
    Unconnected,
    /// Transport connected, handshake pending
    Connected,
    /// Handshake done; operations allowed
    Initialized,
    /// Shut down; terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unconnected => "unconnected",
            Self::Connected => "connected",
            Self::Initialized => "initialized",
            Self::Closed => "closed",
        })
    }
}

/// A client session with one server.
pub struct Session {
    transport: Box<dyn Transport>,
    client_info: Implementation,
    state: Mutex<SessionState>,
    init_result: OnceLock<InitializeResult>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("client_info", &self.client_info)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// Session over `transport`, identifying itself as `client_info`.
    pub fn new(transport: impl Transport + 'static, client_info: Implementation) -> Self {
        Self::from_boxed(Box::new(transport), client_info)
    }

    /// [`Session::new`] for an already boxed transport
    pub fn from_boxed(transport: Box<dyn Transport>, client_info: Implementation) -> Self {
        Self {
            transport,
            client_info,
            state: Mutex::new(SessionState::Unconnected),
            init_result: OnceLock::new(),
        }
    }

    /// Attach peer-request callbacks. Only possible before [`Session::connect`].
    pub fn attach_callbacks(&self, callbacks: CapabilityCallbacks) -> Result<()> {
        self.expect_state("attach callbacks", SessionState::Unconnected)?;
        Ok(self.transport.attach_callbacks(callbacks)?)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The identity sent in `initialize`
    pub fn client_info(&self) -> &Implementation {
        &self.client_info
    }

    /// The underlying transport
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Handshake result, once initialized
    pub fn initialize_result(&self) -> Option<&InitializeResult> {
        self.init_result.get()
    }

    /// Server identity, once initialized
    pub fn server_info(&self) -> Option<&Implementation> {
        self.init_result.get().map(|r| &r.server_info)
    }

    /// Server capabilities, once initialized
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.init_result.get().map(|r| &r.capabilities)
    }

    /// Connect the transport.
    pub async fn connect(&self) -> Result<()> {
        self.expect_state("connect", SessionState::Unconnected)?;
        self.transport.connect().await?;
        self.advance(SessionState::Unconnected, SessionState::Connected);
        debug!(endpoint = ?self.transport.endpoint(), "Session connected");
        Ok(())
    }

    /// Run the `initialize` handshake.
    pub async fn initialize(&self) -> Result<&InitializeResult> {
        self.expect_state("initialize", SessionState::Connected)?;

        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.transport.callbacks().client_capabilities(),
            client_info: self.client_info.clone(),
        };
        let result: InitializeResult = self.request(Method::Initialize, Some(request)).await?;
        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                server = %result.protocol_version,
                client = PROTOCOL_VERSION,
                "Server negotiated a different protocol version"
            );
        }

        self.notify(Method::Initialized, None).await?;

        let result = self.init_result.get_or_init(|| result);
        self.advance(SessionState::Connected, SessionState::Initialized);
        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "Session initialized"
        );
        Ok(result)
    }

    /// Disconnect and close. Valid in every state; repeated calls do nothing.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Transport disconnect failed during shutdown");
        }
        debug!("Session closed");
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state })
        }
    }

    fn advance(&self, from: SessionState, to: SessionState) {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
        }
    }

    /// Send `method` on an initialized session and decode the result.
    pub(crate) async fn call<P, R>(&self, method: Method, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.expect_state(method.as_str(), SessionState::Initialized)?;
        self.request(method, params).await
    }

    async fn request<P, R>(&self, method: Method, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = params
            .map(serde_json::to_value)
            .transpose()
            .map_err(TransportError::from)?;
        let response = self
            .transport
            .send_request(JsonRpcRequest::fresh(method, params))
            .await?;
        serde_json::from_value(response.result).map_err(|e| Error::InvalidResponse {
            method: method.as_str().to_string(),
            reason: e.to_string(),
        })
    }

    async fn notify(&self, method: Method, params: Option<Value>) -> Result<()> {
        self.transport
            .send_notification(JsonRpcNotification::new(method.as_str(), params))
            .await?;
        Ok(())
    }
}
