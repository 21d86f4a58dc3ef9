//! Sessions with a real subprocess server.

use std::process::Command;

use mcplink_client::{ClientConfig, Error, McpClient, ServerEntry, SessionState};
use pretty_assertions::assert_eq;
use serde_json::json;

const SERVER: &str = env!("CARGO_BIN_EXE_calculator-server");
const DEMO: &str = env!("CARGO_BIN_EXE_mcplink-demo");

fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.mcp_servers.insert(
        "calculator".into(),
        ServerEntry::stdio(SERVER, Vec::<String>::new()).with_field("description", "Adds numbers"),
    );
    config
}

#[tokio::test]
async fn test_tool_call_over_subprocess() {
    let client = McpClient::from_config(config());
    let session = client.create_session("calculator").await.unwrap();
    assert_eq!(session.state(), SessionState::Initialized);
    assert_eq!(session.server_info().unwrap().name, "calculator");
    assert!(client.is_connected("calculator"));
    assert!(client.servers_metadata()[0].connected);

    let tools = session.list_tools(None).await.unwrap();
    assert_eq!(tools.tools[0].name, "add");

    let result = session
        .call_tool("add", json!({"a": 10, "b": 20}).as_object().cloned())
        .await
        .unwrap();
    assert_eq!(result.text(), "10 + 20 = 30");

    let err = session.call_tool("divide", None).await.unwrap_err();
    assert_eq!(err.rpc_code(), Some(-32602));

    let contents = session.read_resource("calc://help").await.unwrap().contents;
    assert_eq!(contents[0].uri(), "calc://help");

    // the same session is handed out again
    let again = client.create_session("calculator").await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&session, &again));

    client.close_all_sessions().await;
    assert!(!client.is_connected("calculator"));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.ping().await,
        Err(Error::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_create_all_and_close_one() {
    let client = McpClient::from_config(config());
    let sessions = client.create_all_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);

    sessions[0].ping().await.unwrap();
    client.close_session("calculator").await.unwrap();
    assert!(client.session("calculator").is_none());
}

#[tokio::test]
async fn test_missing_executable_fails_session_setup() {
    let mut client = McpClient::from_config(config());
    client.add_server(
        "ghost",
        ServerEntry::stdio("/nonexistent/mcp-server", ["--stdio"]),
    );
    let err = client.create_session("ghost").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
    assert!(!client.is_connected("ghost"));
}

#[tokio::test]
async fn test_demo_binary_calls_a_tool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.json");
    config().save(&path).await.unwrap();

    let output = Command::new(DEMO)
        .arg("--config")
        .arg(&path)
        .args(["call", "add", r#"{"a": 10, "b": 20}"#])
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "10 + 20 = 30\n");

    let output = Command::new(DEMO)
        .arg("--config")
        .arg(&path)
        .arg("servers")
        .output()
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "calculator\tAdds numbers\n"
    );
}
