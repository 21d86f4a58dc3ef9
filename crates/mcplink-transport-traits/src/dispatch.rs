//! Server-to-client request dispatch.

use mcplink_protocol::types::LoggingMessage;
use mcplink_protocol::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, Method, error_codes,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::callbacks::{CallbackError, CapabilityCallbacks};

/// Why a peer request could not be answered with a result.
///
/// These never surface to local callers; they travel back to the server as
/// JSON-RPC error envelopes whose `data.kind` names the variant.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    /// The method is known but the application attached no handler for it
    #[error("No {capability} callback registered for '{method}'")]
    CallbackMissing {
        /// Requested method
        method: String,
        /// Missing callback
        capability: &'static str,
    },

    /// The client does not serve this method at all
    #[error("Unsupported method: {method}")]
    UnsupportedMethod {
        /// Requested method
        method: String,
    },

    /// The params did not match the method's schema
    #[error("Invalid params for '{method}': {details}")]
    InvalidParams {
        /// Requested method
        method: String,
        /// Decoder message
        details: String,
    },

    /// The callback ran and failed
    #[error("Callback for '{method}' failed: {source}")]
    Callback {
        /// Requested method
        method: String,
        /// Callback failure
        #[source]
        source: CallbackError,
    },
}

impl DispatchError {
    /// Taxonomy name carried in `error.data.kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallbackMissing { .. } => "CallbackMissing",
            Self::UnsupportedMethod { .. } => "UnsupportedMethod",
            Self::InvalidParams { .. } => "InvalidParams",
            Self::Callback { .. } => "CallbackFailed",
        }
    }

    /// The error envelope sent back to the server
    pub fn into_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::CallbackMissing { method, .. } | Self::UnsupportedMethod { method } => {
                JsonRpcError::with_data(
                    error_codes::METHOD_NOT_FOUND,
                    self.to_string(),
                    json!({"kind": self.kind(), "method": method}),
                )
            }
            Self::InvalidParams { method, .. } => JsonRpcError::with_data(
                error_codes::INVALID_PARAMS,
                self.to_string(),
                json!({"kind": self.kind(), "method": method}),
            ),
            Self::Callback { method, source } => {
                let mut error = source.into_jsonrpc_error();
                error.data = Some(json!({"kind": self.kind(), "method": method}));
                error
            }
        }
    }
}

/// Routes peer requests to the attached callbacks.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    callbacks: CapabilityCallbacks,
}

impl Dispatcher {
    /// Dispatcher over a snapshot of `callbacks`
    pub fn new(callbacks: CapabilityCallbacks) -> Self {
        Self { callbacks }
    }

    /// The callbacks this dispatcher serves
    pub fn callbacks(&self) -> &CapabilityCallbacks {
        &self.callbacks
    }

    /// Produce the `result` value for a peer request.
    pub async fn dispatch(&self, request: &JsonRpcRequest) -> Result<Value, DispatchError> {
        let method = request.method.as_str();
        match method.parse::<Method>() {
            Ok(Method::CreateMessage) => {
                let callback = self.callbacks.sampling.as_ref().ok_or_else(|| {
                    DispatchError::CallbackMissing {
                        method: method.to_string(),
                        capability: "sampling",
                    }
                })?;
                let params = decode_params(request)?;
                encode_result(method, callback.create_message(params).await)
            }
            Ok(Method::Elicit) => {
                let callback = self.callbacks.elicitation.as_ref().ok_or_else(|| {
                    DispatchError::CallbackMissing {
                        method: method.to_string(),
                        capability: "elicitation",
                    }
                })?;
                let params = decode_params(request)?;
                encode_result(method, callback.elicit(params).await)
            }
            Ok(Method::ListRoots) => {
                let callback = self.callbacks.list_roots.as_ref().ok_or_else(|| {
                    DispatchError::CallbackMissing {
                        method: method.to_string(),
                        capability: "list_roots",
                    }
                })?;
                encode_result(method, callback.list_roots().await)
            }
            _ => Err(DispatchError::UnsupportedMethod {
                method: method.to_string(),
            }),
        }
    }

    /// Answer a peer request with a response or error envelope carrying its id.
    pub async fn respond(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        match self.dispatch(&request).await {
            Ok(result) => {
                debug!(id = %request.id, method = %request.method, "Answered peer request");
                JsonRpcResponse::success(request.id, result).into()
            }
            Err(e) => {
                warn!(
                    id = %request.id,
                    method = %request.method,
                    kind = e.kind(),
                    error = %e,
                    "Rejecting peer request"
                );
                JsonRpcErrorResponse::new(Some(request.id), e.into_jsonrpc_error()).into()
            }
        }
    }

    /// Handle a peer notification. Only `notifications/message` reaches a callback.
    pub async fn notify(&self, notification: JsonRpcNotification) {
        if notification.method != Method::LogMessage.as_str() {
            debug!(method = %notification.method, "Ignoring notification");
            return;
        }
        let Some(logging) = &self.callbacks.logging else {
            debug!("Server log record dropped, no logging callback attached");
            return;
        };
        let params = notification.params.unwrap_or(Value::Null);
        match serde_json::from_value::<LoggingMessage>(params) {
            Ok(message) => logging.on_log(message).await,
            Err(e) => warn!(error = %e, "Malformed notifications/message params"),
        }
    }
}

fn decode_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, DispatchError> {
    let params = request
        .params
        .clone()
        .unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(params).map_err(|e| DispatchError::InvalidParams {
        method: request.method.clone(),
        details: e.to_string(),
    })
}

fn encode_result<T: Serialize>(
    method: &str,
    result: Result<T, CallbackError>,
) -> Result<Value, DispatchError> {
    let value = result.map_err(|source| DispatchError::Callback {
        method: method.to_string(),
        source,
    })?;
    serde_json::to_value(value).map_err(|e| DispatchError::Callback {
        method: method.to_string(),
        source: CallbackError::failed(format!("result could not be serialized: {e}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{
        CallbackResult, ElicitationCallback, ListRootsCallback, LoggingCallback,
    };
    use async_trait::async_trait;
    use mcplink_protocol::RequestId;
    use mcplink_protocol::types::{
        ElicitRequest, ElicitResult, ListRootsResult, LogLevel, Root,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct Roots;

    #[async_trait]
    impl ListRootsCallback for Roots {
        async fn list_roots(&self) -> CallbackResult<ListRootsResult> {
            Ok(ListRootsResult {
                roots: vec![Root::new("file:///repo", "repo")],
            })
        }
    }

    #[derive(Debug)]
    struct Cancelled;

    #[async_trait]
    impl ElicitationCallback for Cancelled {
        async fn elicit(&self, _request: ElicitRequest) -> CallbackResult<ElicitResult> {
            Err(CallbackError::UserCancelled)
        }
    }

    #[derive(Debug)]
    struct Collect(mpsc::UnboundedSender<LoggingMessage>);

    #[async_trait]
    impl LoggingCallback for Collect {
        async fn on_log(&self, message: LoggingMessage) {
            let _ = self.0.send(message);
        }
    }

    fn peer_request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(RequestId::Number(9), method, params)
    }

    #[tokio::test]
    async fn test_roots_callback_result() {
        let dispatcher = Dispatcher::new(CapabilityCallbacks::new().with_list_roots(Roots));
        let reply = dispatcher.respond(peer_request("roots/list", None)).await;

        assert_eq!(
            reply,
            JsonRpcMessage::Response(JsonRpcResponse::success(
                RequestId::Number(9),
                json!({"roots": [{"uri": "file:///repo", "name": "repo"}]})
            ))
        );
    }

    #[tokio::test]
    async fn test_missing_callback_is_marked() {
        let dispatcher = Dispatcher::default();
        let reply = dispatcher.respond(peer_request("roots/list", None)).await;

        let JsonRpcMessage::Error(error) = reply else {
            panic!("expected error envelope, got {reply:?}");
        };
        assert_eq!(error.id, Some(RequestId::Number(9)));
        assert_eq!(error.error.code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(
            error.error.data,
            Some(json!({"kind": "CallbackMissing", "method": "roots/list"}))
        );
    }

    #[tokio::test]
    async fn test_unknown_method_is_unsupported() {
        let dispatcher = Dispatcher::new(CapabilityCallbacks::new().with_list_roots(Roots));
        let err = dispatcher
            .dispatch(&peer_request("tools/call", Some(json!({}))))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnsupportedMethod { ref method } if method == "tools/call"));
        assert_eq!(err.into_jsonrpc_error().data.unwrap()["kind"], "UnsupportedMethod");
    }

    #[tokio::test]
    async fn test_bad_params_and_callback_failure() {
        let dispatcher = Dispatcher::new(CapabilityCallbacks::new().with_elicitation(Cancelled));

        let invalid = dispatcher
            .dispatch(&peer_request("elicitation/create", Some(json!({"message": 3}))))
            .await
            .unwrap_err();
        assert_eq!(invalid.into_jsonrpc_error().code, error_codes::INVALID_PARAMS);

        let failed = dispatcher
            .dispatch(&peer_request(
                "elicitation/create",
                Some(json!({"message": "name?", "requestedSchema": {"type": "object"}})),
            ))
            .await
            .unwrap_err();
        let envelope = failed.into_jsonrpc_error();
        assert_eq!(envelope.code, -1);
        assert_eq!(envelope.data.unwrap()["kind"], "CallbackFailed");
    }

    #[tokio::test]
    async fn test_log_notifications_reach_the_callback() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(CapabilityCallbacks {
            logging: Some(Arc::new(Collect(tx))),
            ..Default::default()
        });

        dispatcher
            .notify(JsonRpcNotification::new(
                "notifications/message",
                Some(json!({"level": "error", "data": "disk full"})),
            ))
            .await;
        dispatcher
            .notify(JsonRpcNotification::new("notifications/progress", None))
            .await;

        let message = rx.recv().await.unwrap();
        assert_eq!(message.level, LogLevel::Error);
        assert_eq!(message.data, json!("disk full"));
        assert!(rx.try_recv().is_err());
    }
}
