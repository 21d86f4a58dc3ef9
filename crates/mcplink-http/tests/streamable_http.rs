//! Streamable HTTP transport against a mocked server.

use std::time::Duration;

use async_trait::async_trait;
use mcplink_http::{RetryPolicy, StreamableHttpConfig, StreamableHttpTransport};
use mcplink_protocol::types::{ListRootsResult, Root};
use mcplink_protocol::{JsonRpcNotification, JsonRpcRequest, Method};
use mcplink_transport_traits::{
    CallbackResult, CapabilityCallbacks, ListRootsCallback, TimeoutConfig, Transport,
    TransportError, TransportState,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers a POSTed request with `result`, echoing its id.
struct Reply {
    result: Value,
    session: Option<&'static str>,
    as_sse: bool,
}

impl Reply {
    fn json(result: Value) -> Self {
        Self {
            result,
            session: None,
            as_sse: false,
        }
    }
}

impl Respond for Reply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let reply = json!({"jsonrpc": "2.0", "id": body["id"], "result": self.result});
        let mut template = if self.as_sse {
            ResponseTemplate::new(200).set_body_raw(
                format!("event: message\ndata: {reply}\n\n"),
                "text/event-stream",
            )
        } else {
            ResponseTemplate::new(200).set_body_json(reply)
        };
        if let Some(session) = self.session {
            template = template.insert_header("mcp-session-id", session);
        }
        template
    }
}

fn config(server: &MockServer) -> StreamableHttpConfig {
    StreamableHttpConfig::new(format!("{}/mcp", server.uri()))
        .with_retry_policy(RetryPolicy::Never)
}

async fn no_get_stream(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(405))
        .mount(server)
        .await;
}

async fn wait_for_requests(server: &MockServer, verb: &str, count: usize) -> Vec<Request> {
    for _ in 0..200 {
        let seen: Vec<Request> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb)
            .collect();
        if seen.len() >= count {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} {verb} requests");
}

#[tokio::test]
async fn test_session_and_protocol_headers_are_echoed() {
    let server = MockServer::start().await;
    no_get_stream(&server).await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(Reply {
            result: json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "mock", "version": "1.0"}
            }),
            session: Some("sess-1"),
            as_sse: false,
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .and(header("mcp-session-id", "sess-1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "ping"})))
        .and(header("mcp-session-id", "sess-1"))
        .and(header("mcp-protocol-version", "2024-11-05"))
        .respond_with(Reply::json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", "sess-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(config(&server)).unwrap();
    transport.connect().await.unwrap();

    let init = transport
        .send_request(JsonRpcRequest::fresh(
            Method::Initialize,
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "MCP Client", "version": "0.1.0"}
            })),
        ))
        .await
        .unwrap();
    assert_eq!(init.result["serverInfo"]["name"], "mock");
    assert_eq!(transport.session_id().as_deref(), Some("sess-1"));
    assert_eq!(transport.protocol_version().as_deref(), Some("2024-11-05"));

    transport
        .send_notification(JsonRpcNotification::new("notifications/initialized", None))
        .await
        .unwrap();
    let pong = transport
        .send_request(JsonRpcRequest::fresh(Method::Ping, None))
        .await
        .unwrap();
    assert_eq!(pong.result, json!({}));

    transport.disconnect().await.unwrap();
    assert_eq!(transport.state(), TransportState::Disconnected);
    assert_eq!(transport.session_id(), None);
    server.verify().await;
}

#[tokio::test]
async fn test_response_delivered_as_event_stream() {
    let server = MockServer::start().await;
    no_get_stream(&server).await;
    Mock::given(method("POST"))
        .respond_with(Reply {
            result: json!({"tools": [{"name": "add", "inputSchema": {"type": "object"}}]}),
            session: None,
            as_sse: true,
        })
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(config(&server)).unwrap();
    transport.connect().await.unwrap();

    let response = transport
        .send_request(JsonRpcRequest::fresh(Method::ListTools, None))
        .await
        .unwrap();
    assert_eq!(response.result["tools"][0]["name"], "add");

    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_post_one_whole_message_each() {
    let server = MockServer::start().await;
    no_get_stream(&server).await;
    Mock::given(method("POST"))
        .respond_with(Reply::json(json!({})))
        .mount(&server)
        .await;

    let transport = std::sync::Arc::new(StreamableHttpTransport::new(config(&server)).unwrap());
    transport.connect().await.unwrap();

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let transport = std::sync::Arc::clone(&transport);
            let request = JsonRpcRequest::fresh(Method::Ping, None);
            let id = request.id.clone();
            tokio::spawn(async move { (id, transport.send_request(request).await) })
        })
        .collect();
    for call in calls {
        let (id, response) = call.await.unwrap();
        assert_eq!(response.unwrap().id, id);
    }

    let posts = wait_for_requests(&server, "POST", 8).await;
    assert_eq!(posts.len(), 8);
    for post in posts {
        let body: Value = serde_json::from_slice(&post.body).unwrap();
        assert_eq!(body["method"], "ping");
        assert!(body["id"].is_string());
    }

    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_error_envelope_and_http_failure() {
    let server = MockServer::start().await;
    no_get_stream(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call"})))
        .respond_with(|request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            }))
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "prompts/list"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(config(&server)).unwrap();
    transport.connect().await.unwrap();

    let err = transport
        .send_request(JsonRpcRequest::fresh(
            Method::CallTool,
            Some(json!({"name": "nope", "arguments": {}})),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(-32602));

    let err = transport
        .send_request(JsonRpcRequest::fresh(Method::ListPrompts, None))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::SendFailed(ref m) if m.contains("500")));

    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_get_stream_stops_on_method_not_allowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(
        config(&server).with_retry_policy(RetryPolicy::Fixed {
            interval: Duration::from_millis(5),
            max_attempts: None,
        }),
    )
    .unwrap();
    transport.connect().await.unwrap();

    wait_for_requests(&server, "GET", 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    transport.disconnect().await.unwrap();
    server.verify().await;
}

#[derive(Debug)]
struct Workspace;

#[async_trait]
impl ListRootsCallback for Workspace {
    async fn list_roots(&self) -> CallbackResult<ListRootsResult> {
        Ok(ListRootsResult {
            roots: vec![Root::new("file:///work", "work")],
        })
    }
}

#[tokio::test]
async fn test_peer_requests_on_the_get_stream_are_answered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/tools/list_changed\"}\n",
                "{\"jsonrpc\":\"2.0\",\"id\":\"srv-1\",\"method\":\"roots/list\"}\n",
                "{\"jsonrpc\":\"2.0\",\"id\":\"srv-2\",\"method\":\"sampling/createMessage\",",
                "\"params\":{\"messages\":[],\"maxTokens\":10}}\n"
            ),
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(config(&server)).unwrap();
    transport
        .attach_callbacks(CapabilityCallbacks::new().with_list_roots(Workspace))
        .unwrap();
    transport.connect().await.unwrap();

    let posts = wait_for_requests(&server, "POST", 2).await;
    let mut replies: Vec<Value> = posts
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    replies.sort_by_key(|r| r["id"].as_str().unwrap_or_default().to_string());

    assert_eq!(
        replies[0],
        json!({
            "jsonrpc": "2.0",
            "id": "srv-1",
            "result": {"roots": [{"uri": "file:///work", "name": "work"}]}
        })
    );
    assert_eq!(replies[1]["id"], "srv-2");
    assert_eq!(replies[1]["error"]["code"], -32601);
    assert_eq!(replies[1]["error"]["data"]["kind"], "CallbackMissing");

    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let server = MockServer::start().await;
    no_get_stream(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let transport = StreamableHttpTransport::new(
        config(&server)
            .with_timeouts(TimeoutConfig::default().with_request(Duration::from_millis(200))),
    )
    .unwrap();
    transport.connect().await.unwrap();

    let err = transport
        .send_request(JsonRpcRequest::fresh(Method::Ping, None))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(transport.state(), TransportState::Connected);

    transport.disconnect().await.unwrap();
}
