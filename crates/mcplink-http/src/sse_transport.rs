//! Legacy HTTP+SSE client transport.
//!
//! The client opens a GET event stream first. The server's first `endpoint`
//! event names the URL (relative to the stream URL) that takes POSTed
//! messages; nothing is sent before it arrives. Responses, peer requests and
//! notifications all come back as `message` events on the stream.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use mcplink_transport_traits::{
    CapabilityCallbacks, InboundRouter, TimeoutConfig, Transport, TransportCore, TransportError,
    TransportFuture, TransportResult, TransportState, TransportType,
};
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::channel::{self, EVENT_STREAM, HttpChannel, PostSink};
use crate::sse::SseEvent;

/// SSE server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseConfig {
    /// Event stream URL, e.g. `http://localhost:8000/sse`
    pub url: String,

    /// Headers sent with every request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Request, connect and shutdown timeouts
    #[serde(skip)]
    pub timeouts: TimeoutConfig,
}

impl SseConfig {
    /// Config for `url` with default timeouts
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Add a header sent with every request
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check the URL and headers the transport will be built from.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` naming the offending URL or header.
    pub fn validate(&self) -> TransportResult<()> {
        channel::validate_endpoint(&self.url, &self.headers)
    }

    /// Replace the timeouts
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// The data of an `endpoint` event: a bare (possibly relative) URL or
/// `{"uri": "..."}`.
fn endpoint_uri(data: &str) -> TransportResult<String> {
    let data = data.trim();
    if !data.starts_with('{') {
        return Ok(data.to_string());
    }
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| TransportError::MalformedMessage(format!("endpoint event: {e}")))?;
    value
        .get("uri")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            TransportError::MalformedMessage("endpoint event has no 'uri'".to_string())
        })
}

/// JSON-RPC over an SSE stream plus POSTs.
pub struct SseTransport {
    config: SseConfig,
    base: Url,
    core: Arc<TransportCore>,
    channel: Arc<HttpChannel>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("url", &self.config.url)
            .field("endpoint", &self.channel.target().map(String::from))
            .field("state", &self.core.state())
            .finish()
    }
}

impl SseTransport {
    /// Build the transport. Fails on an unparsable URL or invalid headers.
    pub fn new(config: SseConfig) -> TransportResult<Self> {
        let base = channel::parse_url(&config.url)?;
        let client = channel::build_client(&config.headers, config.timeouts.connect, None)?;
        Ok(Self {
            core: Arc::new(TransportCore::new(TransportType::Sse, config.timeouts)),
            channel: Arc::new(HttpChannel::new(client)),
            base,
            config,
            stream_task: Mutex::new(None),
        })
    }

    /// URL messages are POSTed to, once announced
    pub fn message_endpoint(&self) -> Option<Url> {
        self.channel.target()
    }

    async fn open(&self) -> TransportResult<()> {
        let timeout = self.core.timeouts().connect;
        let request = self
            .channel
            .client()
            .get(self.base.clone())
            .header(ACCEPT, EVENT_STREAM)
            .send();
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "GET {} not answered within {timeout:?}",
                    self.base
                ))
            })?
            .map_err(|e| TransportError::ConnectionFailed(format!("GET {}: {e}", self.base)))?;
        if !response.status().is_success() {
            return Err(TransportError::ConnectionFailed(format!(
                "GET {} returned {}",
                self.base,
                response.status()
            )));
        }

        let router = self
            .core
            .router(Arc::new(PostSink::new(Arc::clone(&self.channel))));
        let (ready_tx, ready_rx) = oneshot::channel();
        let events = channel::sse_events(response);
        let task = tokio::spawn(read_stream(
            events,
            self.base.clone(),
            Arc::clone(&self.channel),
            router,
            Arc::clone(&self.core),
            ready_tx,
        ));
        *self.stream_task.lock() = Some(task);

        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(endpoint))) => {
                info!(%endpoint, "SSE message endpoint announced");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(TransportError::ConnectionFailed(
                "event stream ended before the endpoint event".to_string(),
            )),
            Err(_) => Err(TransportError::ConnectionFailed(format!(
                "no endpoint event within {timeout:?}"
            ))),
        }
    }

    fn stop_stream(&self) {
        if let Some(task) = self.stream_task.lock().take() {
            task.abort();
        }
        self.channel.set_target(None);
    }
}

async fn read_stream<S>(
    mut events: S,
    base: Url,
    channel: Arc<HttpChannel>,
    router: InboundRouter,
    core: Arc<TransportCore>,
    ready: oneshot::Sender<TransportResult<Url>>,
) where
    S: futures::Stream<Item = TransportResult<SseEvent>> + Unpin,
{
    let mut ready = Some(ready);
    let reason = loop {
        let event = match events.next().await {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                error!(error = %e, "SSE stream failed");
                break format!("event stream failed: {e}");
            }
            None => break "event stream closed by server".to_string(),
        };

        match event.kind() {
            "endpoint" => {
                let resolved = endpoint_uri(&event.data).and_then(|uri| {
                    base.join(&uri).map_err(|e| {
                        TransportError::MalformedMessage(format!("endpoint '{uri}': {e}"))
                    })
                });
                match (resolved, ready.take()) {
                    (Ok(url), Some(tx)) => {
                        channel.set_target(Some(url.clone()));
                        let _ = tx.send(Ok(url));
                    }
                    (Ok(url), None) => {
                        debug!(%url, "Ignoring repeated endpoint event");
                    }
                    (Err(e), Some(tx)) => {
                        let _ = tx.send(Err(TransportError::ConnectionFailed(e.to_string())));
                        break e.to_string();
                    }
                    (Err(e), None) => warn!(error = %e, "Ignoring bad endpoint event"),
                }
            }
            "message" => {
                if ready.is_some() {
                    warn!("Message event before the endpoint event");
                }
                router.route_text(&event.data);
            }
            other => debug!(event = other, "Ignoring SSE event"),
        }
    };
    debug!(%reason, "SSE reader task completed");
    core.connection_lost(&reason);
}

impl Transport for SseTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Sse
    }

    fn state(&self) -> TransportState {
        self.core.state()
    }

    fn attach_callbacks(&self, callbacks: CapabilityCallbacks) -> TransportResult<()> {
        self.core.attach_callbacks(callbacks)
    }

    fn callbacks(&self) -> CapabilityCallbacks {
        self.core.callbacks()
    }

    fn connect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.core.begin_connect()?;
            info!(url = %self.base, "Opening SSE stream");
            match self.open().await.and_then(|()| self.core.finish_connect()) {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!(error = %e, "Failed to connect SSE transport");
                    self.stop_stream();
                    self.core.pending().cancel_all(e.to_string());
                    self.core.set_state(TransportState::Failed {
                        reason: e.to_string(),
                    });
                    Err(e)
                }
            }
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.core.begin_disconnect();
            self.stop_stream();
            self.core.finish_disconnect();
            debug!("SSE transport disconnected");
            Ok(())
        })
    }

    fn send_request(&self, request: JsonRpcRequest) -> TransportFuture<'_, JsonRpcResponse> {
        Box::pin(async move {
            let channel = &self.channel;
            self.core
                .request(request, |body| async move {
                    channel.post(body).await.map(drop)
                })
                .await
        })
    }

    fn send_notification(&self, notification: JsonRpcNotification) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let body = self.core.notification_wire(&notification)?;
            self.channel.post(body).await.map(drop).map_err(|e| match e {
                TransportError::ConnectionClosed(reason) => TransportError::Unavailable(reason),
                other => other,
            })
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.config.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_endpoint_event_forms() {
        assert_eq!(endpoint_uri("/messages?session_id=1").unwrap(), "/messages?session_id=1");
        assert_eq!(
            endpoint_uri(r#"{"uri":"http://127.0.0.1:8080/mcp"}"#).unwrap(),
            "http://127.0.0.1:8080/mcp"
        );
        assert!(endpoint_uri(r#"{"url":"/x"}"#).is_err());
    }

    #[test]
    fn test_relative_endpoint_resolution() {
        let base = Url::parse("http://localhost:8000/sse").unwrap();
        assert_eq!(
            base.join("/messages/?session_id=ab").unwrap().as_str(),
            "http://localhost:8000/messages/?session_id=ab"
        );
        assert_eq!(
            base.join("messages").unwrap().as_str(),
            "http://localhost:8000/messages"
        );
    }

    #[test]
    fn test_config_from_server_entry() {
        let config: SseConfig = serde_json::from_value(json!({
            "url": "http://localhost:8000/sse",
            "headers": {"Authorization": "Bearer x"},
            "description": "weather"
        }))
        .unwrap();
        assert_eq!(
            config,
            SseConfig::new("http://localhost:8000/sse").with_header("Authorization", "Bearer x")
        );
    }

    #[test]
    fn test_bad_url_is_a_configuration_error() {
        assert!(matches!(
            SseTransport::new(SseConfig::new("::nope")),
            Err(TransportError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_requests_before_connect_fail() {
        let transport = SseTransport::new(SseConfig::new("http://127.0.0.1:9/sse")).unwrap();
        let err = transport
            .send_request(JsonRpcRequest::fresh(mcplink_protocol::Method::Ping, None))
            .await
            .unwrap_err();
        assert!(err.is_closed());
        assert_eq!(transport.message_endpoint(), None);
    }
}
