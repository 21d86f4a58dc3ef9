//! Application callbacks for server-initiated requests
//!
//! A server may call back into the client while a session is open. The
//! application answers those calls by implementing the traits here and
//! attaching them, before connecting, as a [`CapabilityCallbacks`] set.
//! Which callbacks are present also decides which capabilities the client
//! advertises during `initialize`.
//!
//! ```rust
//! use async_trait::async_trait;
//! use mcplink_protocol::types::{ListRootsResult, Root};
//! use mcplink_transport_traits::{CallbackResult, CapabilityCallbacks, ListRootsCallback};
//!
//! #[derive(Debug)]
//! struct Workspace;
//!
//! #[async_trait]
//! impl ListRootsCallback for Workspace {
//!     async fn list_roots(&self) -> CallbackResult<ListRootsResult> {
//!         Ok(ListRootsResult {
//!             roots: vec![Root::new("file:///work", "work")],
//!         })
//!     }
//! }
//!
//! let callbacks = CapabilityCallbacks::new().with_list_roots(Workspace);
//! let caps = callbacks.client_capabilities();
//! assert!(caps.roots.is_some());
//! assert!(caps.sampling.is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mcplink_protocol::JsonRpcError;
use mcplink_protocol::error_codes;
use mcplink_protocol::types::{
    ClientCapabilities, CreateMessageRequest, CreateMessageResult, ElicitRequest, ElicitResult,
    ElicitationCapabilities, ListRootsResult, LoggingMessage, RootsCapabilities,
    SamplingCapabilities,
};
use thiserror::Error;

/// Result type returned by callbacks
pub type CallbackResult<T> = Result<T, CallbackError>;

/// Failure reported by an application callback.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CallbackError {
    /// The user refused the request
    #[error("User rejected the request")]
    UserCancelled,

    /// The request was understood but its content is unacceptable
    #[error("Invalid input: {details}")]
    InvalidInput {
        /// What was wrong
        details: String,
    },

    /// Anything else
    #[error("Callback failed: {message}")]
    Failed {
        /// Failure description
        message: String,
    },

    /// Error from an external system such as an LLM provider
    #[error("External system error: {source}")]
    External {
        /// Underlying error
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CallbackError {
    /// Shorthand for [`CallbackError::Failed`]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// The error envelope sent back to the server
    ///
    /// - `-1`: the user rejected the request
    /// - `-32602`: invalid input
    /// - `-32603`: any other failure
    #[must_use]
    pub fn into_jsonrpc_error(&self) -> JsonRpcError {
        let code = match self {
            Self::UserCancelled => -1,
            Self::InvalidInput { .. } => error_codes::INVALID_PARAMS,
            Self::Failed { .. } | Self::External { .. } => error_codes::INTERNAL_ERROR,
        };
        JsonRpcError::new(code, self.to_string())
    }
}

/// Answers `sampling/createMessage`.
#[async_trait]
pub trait SamplingCallback: Send + Sync + fmt::Debug {
    /// Generate a message for the server
    async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> CallbackResult<CreateMessageResult>;
}

/// Answers `elicitation/create`.
#[async_trait]
pub trait ElicitationCallback: Send + Sync + fmt::Debug {
    /// Ask the user and report what they did
    async fn elicit(&self, request: ElicitRequest) -> CallbackResult<ElicitResult>;
}

/// Answers `roots/list`.
#[async_trait]
pub trait ListRootsCallback: Send + Sync + fmt::Debug {
    /// Roots the server may operate on
    async fn list_roots(&self) -> CallbackResult<ListRootsResult>;
}

/// Receives `notifications/message` log records.
#[async_trait]
pub trait LoggingCallback: Send + Sync + fmt::Debug {
    /// Handle one log record
    async fn on_log(&self, message: LoggingMessage);
}

/// The callbacks attached to a transport.
#[derive(Clone, Default)]
pub struct CapabilityCallbacks {
    /// `sampling/createMessage` handler
    pub sampling: Option<Arc<dyn SamplingCallback>>,
    /// `elicitation/create` handler
    pub elicitation: Option<Arc<dyn ElicitationCallback>>,
    /// `roots/list` handler
    pub list_roots: Option<Arc<dyn ListRootsCallback>>,
    /// `notifications/message` handler
    pub logging: Option<Arc<dyn LoggingCallback>>,
}

impl CapabilityCallbacks {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sampling callback
    #[must_use]
    pub fn with_sampling(mut self, callback: impl SamplingCallback + 'static) -> Self {
        self.sampling = Some(Arc::new(callback));
        self
    }

    /// Attach an elicitation callback
    #[must_use]
    pub fn with_elicitation(mut self, callback: impl ElicitationCallback + 'static) -> Self {
        self.elicitation = Some(Arc::new(callback));
        self
    }

    /// Attach a roots callback
    #[must_use]
    pub fn with_list_roots(mut self, callback: impl ListRootsCallback + 'static) -> Self {
        self.list_roots = Some(Arc::new(callback));
        self
    }

    /// Attach a logging callback
    #[must_use]
    pub fn with_logging(mut self, callback: impl LoggingCallback + 'static) -> Self {
        self.logging = Some(Arc::new(callback));
        self
    }

    /// `true` when nothing is attached
    pub fn is_empty(&self) -> bool {
        self.sampling.is_none()
            && self.elicitation.is_none()
            && self.list_roots.is_none()
            && self.logging.is_none()
    }

    /// Capabilities implied by the attached callbacks.
    ///
    /// `roots` (with `listChanged: true`) iff a roots callback is present,
    /// `sampling` and `elicitation` as empty objects iff theirs are.
    pub fn client_capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            experimental: None,
            roots: self.list_roots.as_ref().map(|_| RootsCapabilities {
                list_changed: Some(true),
            }),
            sampling: self
                .sampling
                .as_ref()
                .map(|_| SamplingCapabilities::default()),
            elicitation: self
                .elicitation
                .as_ref()
                .map(|_| ElicitationCapabilities::default()),
        }
    }
}

impl fmt::Debug for CapabilityCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityCallbacks")
            .field("sampling", &self.sampling.is_some())
            .field("elicitation", &self.elicitation.is_some())
            .field("list_roots", &self.list_roots.is_some())
            .field("logging", &self.logging.is_some())
            .finish()
    }
}
