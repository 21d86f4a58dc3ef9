//! # JSON-RPC 2.0 envelope
//!
//! The wire model is a tagged union of four shapes. Incoming JSON is classified
//! exactly once, by [`JsonRpcMessage::from_value`], using the presence rule:
//!
//! | shape        | members                    |
//! |--------------|----------------------------|
//! | Request      | `id` + `method`            |
//! | Response     | `id` + `result`            |
//! | Error        | `id` (may be null) + `error` |
//! | Notification | `method`, no `id`          |
//!
//! Anything else, including a `method` that also carries `result` or `error`,
//! is rejected with [`MessageError::MalformedMessage`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{MessageError, error_codes};
use crate::method::Method;

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC version tag, always serialized as `"2.0"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier (the client always generates these)
    String(String),
    /// Integer identifier (servers may use these for their own requests)
    Number(i64),
}

impl RequestId {
    /// A fresh random identifier. Two calls never return the same value in practice.
    #[must_use]
    pub fn random() -> Self {
        Self::String(Uuid::new_v4().to_string())
    }

    fn from_json(value: Value) -> Result<Self, MessageError> {
        match value {
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => n.as_i64().map(Self::Number).ok_or_else(|| {
                MessageError::malformed(format!("id must be a string or an integer, got {n}"))
            }),
            other => Err(MessageError::malformed(format!(
                "id must be a string or an integer, got {other}"
            ))),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// JSON-RPC request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: RequestId,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a request with an explicit id
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a request for `method` tagged with a fresh random id
    pub fn fresh(method: Method, params: Option<Value>) -> Self {
        Self::new(RequestId::random(), method.as_str(), params)
    }
}

/// Successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Identifier of the request being answered
    pub id: RequestId,
    /// Response result
    pub result: Value,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result,
        }
    }
}

/// Failed JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Identifier of the request being answered (`null` for parse errors)
    pub id: Option<RequestId>,
    /// Response error
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    /// Create an error response for the given request id
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            error,
        }
    }
}

/// JSON-RPC notification message (no response expected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(details: &str) -> Self {
        Self::new(
            error_codes::INVALID_PARAMS,
            format!("Invalid params: {details}"),
        )
    }

    /// Create an internal error (-32603)
    pub fn internal_error(details: &str) -> Self {
        Self::new(
            error_codes::INTERNAL_ERROR,
            format!("Internal error: {details}"),
        )
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// One wire message, classified by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// `id` + `method`
    Request(JsonRpcRequest),
    /// `id` + `result`
    Response(JsonRpcResponse),
    /// `id` + `error`
    Error(JsonRpcErrorResponse),
    /// `method` without `id`
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Validate and classify an untyped JSON value.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Object(mut object) = value else {
            return Err(MessageError::malformed("expected a JSON object"));
        };

        match object.remove("jsonrpc") {
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(other) => return Err(MessageError::InvalidVersion(other.to_string())),
            None => return Err(MessageError::InvalidVersion("missing".to_string())),
        }

        let id = object.remove("id");
        let method = object.remove("method");
        let result = object.remove("result");
        let error = object.remove("error");

        match (method, result, error) {
            (Some(method), None, None) => {
                let Value::String(method) = method else {
                    return Err(MessageError::malformed("method must be a string"));
                };
                let params = take_params(&mut object)?;
                match id {
                    None => Ok(Self::Notification(JsonRpcNotification::new(method, params))),
                    Some(Value::Null) => Err(MessageError::malformed(
                        "request id must not be null",
                    )),
                    Some(id) => Ok(Self::Request(JsonRpcRequest::new(
                        RequestId::from_json(id)?,
                        method,
                        params,
                    ))),
                }
            }
            (Some(_), _, _) => Err(MessageError::malformed(
                "message carries a method together with a result or error",
            )),
            (None, Some(_), Some(_)) => Err(MessageError::malformed(
                "message carries both result and error",
            )),
            (None, Some(result), None) => match id {
                Some(id) if !id.is_null() => Ok(Self::Response(JsonRpcResponse::success(
                    RequestId::from_json(id)?,
                    result,
                ))),
                _ => Err(MessageError::malformed("response without an id")),
            },
            (None, None, Some(error)) => {
                let error: JsonRpcError = serde_json::from_value(error)
                    .map_err(|e| MessageError::malformed(format!("invalid error object: {e}")))?;
                let id = match id {
                    None | Some(Value::Null) => None,
                    Some(id) => Some(RequestId::from_json(id)?),
                };
                Ok(Self::Error(JsonRpcErrorResponse::new(id, error)))
            }
            (None, None, None) => Err(MessageError::malformed(
                "message has no method, result or error",
            )),
        }
    }

    /// Parse and classify raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Serialize back to the untyped wire value.
    pub fn to_value(&self) -> Result<Value, MessageError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize to compact single-line JSON.
    pub fn to_json_string(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The message id, if the shape carries one
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(request) => Some(&request.id),
            Self::Response(response) => Some(&response.id),
            Self::Error(error) => error.id.as_ref(),
            Self::Notification(_) => None,
        }
    }

    /// The method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(request) => Some(&request.method),
            Self::Notification(notification) => Some(&notification.method),
            Self::Response(_) | Self::Error(_) => None,
        }
    }

    /// Returns `true` for a peer-initiated request
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Returns `true` for a success response
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Returns `true` for an error response
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns `true` for a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }
}

fn take_params(object: &mut Map<String, Value>) -> Result<Option<Value>, MessageError> {
    match object.remove("params") {
        None | Some(Value::Null) => Ok(None),
        Some(params @ (Value::Object(_) | Value::Array(_))) => Ok(Some(params)),
        Some(other) => Err(MessageError::malformed(format!(
            "params must be an object or an array, got {other}"
        ))),
    }
}

impl FromStr for JsonRpcMessage {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcErrorResponse> for JsonRpcMessage {
    fn from(error: JsonRpcErrorResponse) -> Self {
        Self::Error(error)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_classifies_each_shape() {
        let request = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "id": "a", "method": "tools/list", "params": {}
        }))
        .unwrap();
        assert!(request.is_request());
        assert_eq!(request.id(), Some(&RequestId::from("a")));

        let response =
            JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 7, "result": {}})).unwrap();
        assert!(response.is_response());
        assert_eq!(response.id(), Some(&RequestId::Number(7)));

        let error = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "id": "b", "error": {"code": -32601, "message": "nope"}
        }))
        .unwrap();
        assert!(error.is_error());

        let notification = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(notification.is_notification());
        assert_eq!(notification.id(), None);
    }

    #[test]
    fn test_round_trip_preserves_every_shape() {
        let messages = vec![
            JsonRpcMessage::from(JsonRpcRequest::new(
                RequestId::from("req-1"),
                "tools/call",
                Some(json!({"name": "add", "arguments": {"a": 10, "b": 20}})),
            )),
            JsonRpcMessage::from(JsonRpcResponse::success(
                RequestId::Number(3),
                json!({"tools": []}),
            )),
            JsonRpcMessage::from(JsonRpcErrorResponse::new(
                Some(RequestId::from("req-2")),
                JsonRpcError::with_data(-32000, "boom", json!({"detail": 1})),
            )),
            JsonRpcMessage::from(JsonRpcNotification::new(
                "notifications/roots/list_changed",
                None,
            )),
        ];

        for message in messages {
            let wire = message.to_json_string().unwrap();
            let parsed: JsonRpcMessage = wire.parse().unwrap();
            assert_eq!(parsed, message);
        }
    }

    #[test]
    fn test_error_with_null_id_is_accepted() {
        let message = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}
        }))
        .unwrap();

        let JsonRpcMessage::Error(error) = message else {
            panic!("expected error shape");
        };
        assert_eq!(error.id, None);
        assert_eq!(error.error.code, error_codes::PARSE_ERROR);
        assert_eq!(
            serde_json::to_value(&error).unwrap()["id"],
            Value::Null,
            "null id must be written back explicitly"
        );
    }

    #[test]
    fn test_rejects_ambiguous_messages() {
        let cases = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "result": {}}),
            json!({"jsonrpc": "2.0", "method": "ping", "error": {"code": 1, "message": "x"}}),
            json!({"jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": 1, "message": "x"}}),
            json!({"jsonrpc": "2.0", "id": 1}),
            json!({"jsonrpc": "2.0", "result": {}}),
            json!({"jsonrpc": "2.0", "id": null, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 1.5, "method": "ping"}),
            json!({"jsonrpc": "2.0", "method": 12}),
            json!({"jsonrpc": "2.0", "method": "ping", "params": "flat"}),
            json!(["not", "an", "object"]),
        ];

        for case in cases {
            let result = JsonRpcMessage::from_value(case.clone());
            assert!(
                matches!(result, Err(MessageError::MalformedMessage(_))),
                "expected MalformedMessage for {case}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_rejects_wrong_or_missing_version() {
        let wrong = JsonRpcMessage::from_value(json!({"jsonrpc": "1.0", "method": "ping"}));
        assert!(matches!(wrong, Err(MessageError::InvalidVersion(_))));

        let missing = JsonRpcMessage::from_value(json!({"method": "ping"}));
        assert!(matches!(missing, Err(MessageError::InvalidVersion(_))));
    }

    #[test]
    fn test_invalid_json_text() {
        let result = "{not json".parse::<JsonRpcMessage>();
        assert!(matches!(result, Err(MessageError::Json(_))));
    }

    #[test]
    fn test_fresh_requests_get_distinct_ids() {
        let a = JsonRpcRequest::fresh(Method::Ping, None);
        let b = JsonRpcRequest::fresh(Method::Ping, None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.method, "ping");
    }

    #[test]
    fn test_serde_deserialize_goes_through_factory() {
        let result: Result<JsonRpcMessage, _> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"x","result":1}"#);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_request_round_trip(
            id in prop_oneof![any::<i64>().prop_map(RequestId::Number), "[a-z0-9-]{1,24}".prop_map(RequestId::String)],
            method in "[a-z]{1,10}(/[a-z_]{1,10})?",
            arg in any::<i32>(),
        ) {
            let message = JsonRpcMessage::from(JsonRpcRequest::new(
                id,
                method,
                Some(json!({"value": arg})),
            ));
            let wire = message.to_json_string().unwrap();
            let parsed: JsonRpcMessage = wire.parse().unwrap();
            prop_assert_eq!(parsed, message);
        }
    }
}
