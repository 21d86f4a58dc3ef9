//! HTTP plumbing shared by the SSE and streamable transports.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use mcplink_protocol::JsonRpcMessage;
use mcplink_transport_traits::{
    InboundRouter, MessageSink, TransportError, TransportFuture, TransportResult,
};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::{debug, trace, warn};
use url::Url;

use crate::sse::{SseDecoder, SseEvent};

/// Session header echoed on every request once the server assigns one
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Protocol version header sent after `initialize`
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

pub(crate) const EVENT_STREAM: &str = "text/event-stream";
pub(crate) const JSON_OR_EVENT_STREAM: &str = "application/json, text/event-stream";

/// Static headers from the server entry, validated.
pub(crate) fn header_map(headers: &HashMap<String, String>) -> TransportResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::ConfigurationError(format!("invalid header name '{name}': {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::ConfigurationError(format!("invalid value for header '{name}': {e}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// `reqwest` client with the entry's headers as defaults.
pub(crate) fn build_client(
    headers: &HashMap<String, String>,
    connect_timeout: Duration,
    user_agent: Option<&str>,
) -> TransportResult<Client> {
    let mut builder = Client::builder()
        .default_headers(header_map(headers)?)
        .connect_timeout(connect_timeout);
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder
        .build()
        .map_err(|e| TransportError::ConfigurationError(format!("HTTP client: {e}")))
}

/// Parse a configured URL; only `http` and `https` are accepted.
pub(crate) fn parse_url(url: &str) -> TransportResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| TransportError::ConfigurationError(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(TransportError::ConfigurationError(format!(
            "invalid URL '{url}': unsupported scheme '{other}'"
        ))),
    }
}

/// Check a server URL and its static headers without building a client.
pub(crate) fn validate_endpoint(
    url: &str,
    headers: &HashMap<String, String>,
) -> TransportResult<()> {
    parse_url(url)?;
    header_map(headers)?;
    Ok(())
}

/// Where messages are POSTed, plus the session headers echoed with them.
#[derive(Debug)]
pub(crate) struct HttpChannel {
    client: Client,
    target: RwLock<Option<Url>>,
    session_id: RwLock<Option<String>>,
    protocol_version: RwLock<Option<String>>,
}

impl HttpChannel {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            target: RwLock::new(None),
            session_id: RwLock::new(None),
            protocol_version: RwLock::new(None),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn target(&self) -> Option<Url> {
        self.target.read().clone()
    }

    pub(crate) fn set_target(&self, url: Option<Url>) {
        *self.target.write() = url;
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub(crate) fn protocol_version(&self) -> Option<String> {
        self.protocol_version.read().clone()
    }

    pub(crate) fn set_protocol_version(&self, version: Option<String>) {
        *self.protocol_version.write() = version;
    }

    /// Forget the session headers
    pub(crate) fn reset_session(&self) {
        *self.session_id.write() = None;
        *self.protocol_version.write() = None;
    }

    /// Attach the session headers known so far
    pub(crate) fn with_session(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(id) = self.session_id() {
            request = request.header(SESSION_ID_HEADER, id);
        }
        if let Some(version) = self.protocol_version() {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }
        request
    }

    /// Remember a session id announced in `response`
    pub(crate) fn capture_session(&self, response: &Response) {
        let Some(id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };
        let mut current = self.session_id.write();
        if current.as_deref() != Some(id) {
            debug!(session_id = id, "Server assigned session");
            *current = Some(id.to_string());
        }
    }

    /// POST one serialized message to the current target.
    pub(crate) async fn post(&self, body: String) -> TransportResult<Response> {
        let url = self.target().ok_or_else(|| {
            TransportError::ConnectionClosed("no message endpoint available".to_string())
        })?;
        trace!(%url, body = %body, "POST");
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, JSON_OR_EVENT_STREAM)
            .body(body);
        let response = self
            .with_session(request)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(format!("POST {url}: {e}")))?;

        self.capture_session(&response);
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::SendFailed(format!(
                "POST {url} returned {status}"
            )));
        }
        Ok(response)
    }
}

/// Replies to peer requests are POSTed like any other message.
#[derive(Debug)]
pub(crate) struct PostSink {
    channel: Arc<HttpChannel>,
}

impl PostSink {
    pub(crate) fn new(channel: Arc<HttpChannel>) -> Self {
        Self { channel }
    }
}

impl MessageSink for PostSink {
    fn deliver(&self, message: JsonRpcMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let body = serde_json::to_string(&message)?;
            let response = self.channel.post(body).await?;
            trace!(status = %response.status(), "Reply accepted");
            Ok(())
        })
    }
}

/// Media type of a response, lowercased and without parameters
pub(crate) fn media_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Route whatever a POST returned: nothing for `202`, a JSON message (or
/// batch), or an SSE stream of messages.
pub(crate) async fn route_body(response: Response, router: &InboundRouter) -> TransportResult<()> {
    if response.status() == StatusCode::ACCEPTED || response.status() == StatusCode::NO_CONTENT {
        return Ok(());
    }
    match media_type(&response).as_str() {
        EVENT_STREAM => {
            let mut events = sse_events(response);
            while let Some(event) = events.next().await {
                let event = event?;
                if event.kind() == "message" {
                    router.route_text(&event.data);
                }
            }
            Ok(())
        }
        "application/json" => {
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Io(format!("reading response body: {e}")))?;
            route_json(&body, router);
            Ok(())
        }
        "" => Ok(()),
        other => {
            warn!(content_type = other, "Ignoring response body of unexpected type");
            Ok(())
        }
    }
}

/// Route a JSON body holding one message or a batch.
pub(crate) fn route_json(body: &str, router: &InboundRouter) {
    let trimmed = body.trim();
    if !trimmed.starts_with('[') {
        router.route_text(trimmed);
        return;
    }
    match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
        Ok(batch) => {
            for value in batch {
                match JsonRpcMessage::from_value(value) {
                    Ok(message) => {
                        router.route(message);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed batch entry"),
                }
            }
        }
        Err(e) => warn!(error = %e, "Skipping malformed JSON batch"),
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

fn byte_reader(response: Response) -> StreamReader<ByteStream, Bytes> {
    StreamReader::new(Box::pin(response.bytes_stream().map_err(io::Error::other)))
}

/// Decode a response body as Server-Sent Events
pub(crate) fn sse_events(
    response: Response,
) -> impl Stream<Item = TransportResult<SseEvent>> + Send + Unpin {
    FramedRead::new(byte_reader(response), SseDecoder::new())
}

/// Decode a response body as newline-delimited frames
pub(crate) fn json_lines(
    response: Response,
) -> impl Stream<Item = TransportResult<String>> + Send + Unpin {
    FramedRead::new(
        byte_reader(response),
        LinesCodec::new_with_max_length(mcplink_protocol::MAX_MESSAGE_SIZE),
    )
    .map_err(|e| TransportError::MalformedMessage(e.to_string()))
}
