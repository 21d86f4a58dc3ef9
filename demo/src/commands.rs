//! Subcommand implementations.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use mcplink_client::{
    CapabilityCallbacks, LoggingCallback, McpClient, Session, TimeoutConfig,
};
use mcplink_protocol::types::{LogLevel, LoggingMessage, ResourceContents};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cli::{Cli, Command};

/// Re-emits server log records through `tracing`.
#[derive(Debug)]
struct TraceServerLogs;

#[async_trait]
impl LoggingCallback for TraceServerLogs {
    async fn on_log(&self, message: LoggingMessage) {
        let logger = message.logger.as_deref().unwrap_or("server");
        match message.level {
            LogLevel::Debug => debug!(logger, data = %message.data, "server log"),
            LogLevel::Info | LogLevel::Notice => info!(logger, data = %message.data, "server log"),
            LogLevel::Warning => warn!(logger, data = %message.data, "server log"),
            _ => error!(logger, data = %message.data, "server log"),
        }
    }
}

pub(crate) async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = McpClient::from_config_file(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_callbacks(CapabilityCallbacks::new().with_logging(TraceServerLogs))
        .with_timeouts(TimeoutConfig::default().with_request(Duration::from_secs(cli.timeout)));

    if let Command::Servers = cli.command {
        for server in client.servers_metadata() {
            println!("{}\t{}", server.name, server.description);
        }
        return Ok(());
    }

    let name = pick_server(&client, cli.server.as_deref())?;
    let session = client
        .create_session(&name)
        .await
        .with_context(|| format!("opening session with '{name}'"))?;

    let outcome = execute(&session, cli.command).await;
    client.close_all_sessions().await;
    outcome
}

fn pick_server(client: &McpClient, requested: Option<&str>) -> anyhow::Result<String> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }
    match client.server_names().as_slice() {
        [] => bail!("the config lists no servers"),
        [only] => Ok(only.clone()),
        names => bail!("several servers configured, pick one with --server: {}", names.join(", ")),
    }
}

async fn execute(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Servers => {}
        Command::Tools => {
            let mut cursor = None;
            loop {
                let page = session.list_tools(cursor).await?;
                for tool in page.tools {
                    println!("{}\t{}", tool.name, tool.description.unwrap_or_default());
                }
                cursor = page.next_cursor;
                if cursor.is_none() {
                    break;
                }
            }
        }
        Command::Call { name, arguments } => {
            let arguments: Value =
                serde_json::from_str(&arguments).context("arguments must be JSON")?;
            let Value::Object(arguments) = arguments else {
                bail!("arguments must be a JSON object");
            };
            let result = session.call_tool(&name, Some(arguments)).await?;
            let text = result.text();
            if text.is_empty() {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{text}");
            }
            if result.is_error() {
                bail!("tool '{name}' reported an error");
            }
        }
        Command::Resources => {
            let page = session.list_resources(None).await?;
            for resource in page.resources {
                println!("{}\t{}", resource.uri, resource.name);
            }
        }
        Command::Read { uri } => {
            for contents in session.read_resource(&uri).await?.contents {
                match contents {
                    ResourceContents::Text(text) => println!("{}", text.text),
                    ResourceContents::Blob(blob) => {
                        println!("<{} bytes of base64 from {}>", blob.blob.len(), blob.uri);
                    }
                }
            }
        }
        Command::Prompts => {
            let page = session.list_prompts(None).await?;
            for prompt in page.prompts {
                println!("{}\t{}", prompt.name, prompt.description.unwrap_or_default());
            }
        }
    }
    Ok(())
}
