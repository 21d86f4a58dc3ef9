//! Streamable HTTP client transport.
//!
//! Every message is POSTed to one URL. A POST returns `202` (nothing to
//! route), a JSON body, or an SSE stream; message bodies are routed like any
//! inbound frame. A background GET on the same URL carries server-initiated
//! traffic, framed as SSE or as newline-delimited JSON, and is reopened per
//! [`RetryPolicy`] until the server answers `405`.
//!
//! The session id returned in `mcp-session-id` and the protocol version
//! negotiated by `initialize` are echoed on every later request. A
//! best-effort `DELETE` ends the session on disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Method};
use mcplink_transport_traits::{
    CapabilityCallbacks, InboundRouter, TimeoutConfig, Transport, TransportCore, TransportError,
    TransportFuture, TransportResult, TransportState, TransportType,
};
use parking_lot::{Mutex, RwLock};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::{self, EVENT_STREAM, HttpChannel, JSON_OR_EVENT_STREAM, PostSink};
use crate::retry::RetryPolicy;

/// Streamable HTTP server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamableHttpConfig {
    /// The single MCP endpoint, e.g. `http://localhost:8000/mcp`
    pub url: String,

    /// Headers sent with every request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Request, connect and shutdown timeouts
    #[serde(skip)]
    pub timeouts: TimeoutConfig,

    /// Reopen policy for the GET stream
    #[serde(skip)]
    pub retry_policy: RetryPolicy,

    /// `User-Agent` header; `None` leaves it unset
    #[serde(skip)]
    pub user_agent: Option<String>,
}

impl StreamableHttpConfig {
    /// Config for `url` with defaults
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeouts: TimeoutConfig::default(),
            retry_policy: RetryPolicy::default(),
            user_agent: Some(format!("mcplink/{}", env!("CARGO_PKG_VERSION"))),
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

    /// Replace the GET stream retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000/mcp")
    }
}

/// JSON-RPC over POST plus an optional GET stream.
pub struct StreamableHttpTransport {
    config: StreamableHttpConfig,
    url: Url,
    core: Arc<TransportCore>,
    channel: Arc<HttpChannel>,
    router: RwLock<Option<InboundRouter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for StreamableHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpTransport")
            .field("url", &self.config.url)
            .field("session_id", &self.channel.session_id())
            .field("state", &self.core.state())
            .finish()
    }
}

impl StreamableHttpTransport {
    /// Build the transport. Fails on an unparsable URL or invalid headers.
    pub fn new(config: StreamableHttpConfig) -> TransportResult<Self> {
        let url = channel::parse_url(&config.url)?;
        let client = channel::build_client(
            &config.headers,
            config.timeouts.connect,
            config.user_agent.as_deref(),
        )?;
        Ok(Self {
            core: Arc::new(TransportCore::new(
                TransportType::StreamableHttp,
                config.timeouts,
            )),
            channel: Arc::new(HttpChannel::new(client)),
            url,
            config,
            router: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Session id assigned by the server, if any
    pub fn session_id(&self) -> Option<String> {
        self.channel.session_id()
    }

    /// Protocol version negotiated by `initialize`, if any
    pub fn protocol_version(&self) -> Option<String> {
        self.channel.protocol_version()
    }

    fn current_router(&self) -> TransportResult<InboundRouter> {
        self.router
            .read()
            .clone()
            .ok_or_else(|| TransportError::ConnectionClosed("transport is not connected".into()))
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// POST `body` and route whatever comes back.
    async fn exchange_body(&self, body: String) -> TransportResult<()> {
        let router = self.current_router()?;
        let response = self.channel.post(body).await?;
        if channel::media_type(&response) == EVENT_STREAM {
            // The stream may outlive this call; the reply is picked up from it.
            self.track(tokio::spawn(async move {
                if let Err(e) = channel::route_body(response, &router).await {
                    warn!(error = %e, "POST event stream failed");
                }
            }));
            Ok(())
        } else {
            channel::route_body(response, &router).await
        }
    }

    async fn delete_session(&self) {
        let request = self
            .channel
            .with_session(self.channel.client().delete(self.url.clone()))
            .header(ACCEPT, JSON_OR_EVENT_STREAM);
        match tokio::time::timeout(self.core.timeouts().shutdown, request.send()).await {
            Ok(Ok(response)) => debug!(status = %response.status(), "Session DELETE answered"),
            Ok(Err(e)) => debug!(error = %e, "Session DELETE failed"),
            Err(_) => debug!("Session DELETE timed out"),
        }
    }
}

/// Keep a GET stream open for server-initiated messages.
async fn listen(
    url: Url,
    channel: Arc<HttpChannel>,
    router: InboundRouter,
    policy: RetryPolicy,
) {
    let mut attempt = 0u32;
    loop {
        let request = channel
            .with_session(channel.client().get(url.clone()))
            .header(ACCEPT, EVENT_STREAM);
        match request.send().await {
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                debug!("Server offers no GET stream");
                return;
            }
            Ok(response) if response.status().is_success() => {
                channel.capture_session(&response);
                attempt = 0;
                debug!("GET stream open");
                drain(response, &router).await;
                debug!("GET stream ended");
            }
            Ok(response) => warn!(status = %response.status(), "GET stream rejected"),
            Err(e) => warn!(error = %e, "GET stream failed"),
        }

        let Some(delay) = policy.delay(attempt) else {
            debug!(attempt, "Not reopening GET stream");
            return;
        };
        attempt += 1;
        debug!(?delay, attempt, "Reopening GET stream");
        tokio::time::sleep(delay).await;
    }
}

async fn drain(response: reqwest::Response, router: &InboundRouter) {
    if channel::media_type(&response) == EVENT_STREAM {
        let mut events = channel::sse_events(response);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) if event.kind() == "message" => {
                    router.route_text(&event.data);
                }
                Ok(event) => debug!(event = event.kind(), "Ignoring SSE event"),
                Err(e) => {
                    warn!(error = %e, "GET event stream failed");
                    return;
                }
            }
        }
    } else {
        let mut lines = channel::json_lines(response);
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    router.route_text(&line);
                }
                Err(e) => {
                    warn!(error = %e, "GET stream failed");
                    return;
                }
            }
        }
    }
}

impl Transport for StreamableHttpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::StreamableHttp
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
            info!(url = %self.url, "Connecting streamable HTTP transport");

            self.channel.set_target(Some(self.url.clone()));
            let router = self
                .core
                .router(Arc::new(PostSink::new(Arc::clone(&self.channel))));
            *self.router.write() = Some(router.clone());

            self.track(tokio::spawn(listen(
                self.url.clone(),
                Arc::clone(&self.channel),
                router,
                self.config.retry_policy.clone(),
            )));

            self.core.finish_connect()
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let was_open = matches!(
                self.core.state(),
                TransportState::Connected | TransportState::Failed { .. }
            );
            self.core.begin_disconnect();

            let tasks = std::mem::take(&mut *self.tasks.lock());
            for task in tasks {
                task.abort();
            }
            *self.router.write() = None;

            if was_open {
                self.delete_session().await;
            }
            self.channel.reset_session();
            self.channel.set_target(None);
            self.core.finish_disconnect();
            debug!("Streamable HTTP transport disconnected");
            Ok(())
        })
    }

    fn send_request(&self, request: JsonRpcRequest) -> TransportFuture<'_, JsonRpcResponse> {
        Box::pin(async move {
            let is_initialize = request.method == Method::Initialize.as_str();
            let response = self
                .core
                .request(request, |body| self.exchange_body(body))
                .await?;

            if is_initialize {
                let version = response
                    .result
                    .get("protocolVersion")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
                debug!(?version, "Negotiated protocol version");
                self.channel.set_protocol_version(version);
            }
            Ok(response)
        })
    }

    fn send_notification(&self, notification: JsonRpcNotification) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let body = self.core.notification_wire(&notification)?;
            self.exchange_body(body).await.map_err(|e| match e {
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
    fn test_config_from_server_entry() {
        let config: StreamableHttpConfig = serde_json::from_value(json!({
            "url": "https://example.com/mcp",
            "description": "remote"
        }))
        .unwrap();
        assert_eq!(config.url, "https://example.com/mcp");
        assert!(config.headers.is_empty());
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert_eq!(config.user_agent, None);

        assert!(
            StreamableHttpConfig::default()
                .user_agent
                .unwrap()
                .starts_with("mcplink/")
        );
    }

    #[tokio::test]
    async fn test_state_before_connect() {
        let transport =
            StreamableHttpTransport::new(StreamableHttpConfig::new("http://127.0.0.1:9/mcp"))
                .unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert_eq!(transport.session_id(), None);
        assert_eq!(transport.endpoint().as_deref(), Some("http://127.0.0.1:9/mcp"));

        let err = transport
            .send_notification(JsonRpcNotification::new("notifications/initialized", None))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));

        transport.disconnect().await.unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
    }
}
