//! Minimal calculator server over stdio.
//!
//! Speaks just enough of the protocol for end-to-end tests: `initialize`,
//! `ping`, `tools/list`, `tools/call` (`add`), and a single text resource.
//! stdout carries only JSON-RPC; diagnostics go to stderr.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn add(arguments: &Value) -> Result<Value, String> {
    let operand = |key: &str| {
        arguments
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("'{key}' must be a number"))
    };
    let (a, b) = (operand("a")?, operand("b")?);
    Ok(json!({
        "content": [{"type": "text", "text": format!("{a} + {b} = {}", a + b)}]
    }))
}

fn handle(method: &str, params: &Value) -> Result<Value, (i64, String)> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": params
                .get("protocolVersion")
                .cloned()
                .unwrap_or_else(|| json!("2024-11-05")),
            "capabilities": {"tools": {}, "resources": {}},
            "serverInfo": {"name": "calculator", "version": env!("CARGO_PKG_VERSION")}
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({
            "tools": [{
                "name": "add",
                "description": "Add two numbers",
                "inputSchema": {
                    "type": "object",
                    "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                    "required": ["a", "b"]
                }
            }]
        })),
        "tools/call" => match params.get("name").and_then(Value::as_str) {
            Some("add") => add(params.get("arguments").unwrap_or(&Value::Null))
                .map_err(|e| (-32602, e)),
            other => Err((-32602, format!("Unknown tool: {}", other.unwrap_or("<none>")))),
        },
        "resources/list" => Ok(json!({
            "resources": [{"uri": "calc://help", "name": "help", "mimeType": "text/plain"}]
        })),
        "resources/read" => Ok(json!({
            "contents": [{"uri": "calc://help", "mimeType": "text/plain", "text": "add(a, b)"}]
        })),
        "prompts/list" => Ok(json!({"prompts": []})),
        other => Err((-32601, format!("Method not found: {other}"))),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    eprintln!("calculator-server ready");

    while let Some(line) = lines.next_line().await? {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            eprintln!("skipping unparsable line");
            continue;
        };
        let (Some(id), Some(method)) = (message.get("id"), message["method"].as_str()) else {
            // notifications and stray responses
            continue;
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let reply = match handle(method, &params) {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err((code, text)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": text}
            }),
        };
        let mut out = reply.to_string();
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
