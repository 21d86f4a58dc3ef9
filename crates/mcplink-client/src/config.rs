//! Server entries and the `mcpServers` config file.
//!
//! A server entry is kept as the raw JSON object it was read from, so members
//! the client does not interpret (`description`, editor hints, ...) survive a
//! load/save cycle. The transport is picked when the entry is classified:
//!
//! | entry | transport |
//! |---|---|
//! | `command` and `args` | subprocess over stdio |
//! | `url` containing `sse` | HTTP + SSE |
//! | `url` containing `mcp` | streamable HTTP |
//!
//! Anything else is rejected with [`Error::InvalidServerConfig`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use mcplink_http::{SseConfig, SseTransport, StreamableHttpConfig, StreamableHttpTransport};
use mcplink_stdio::{StdioServerParams, StdioTransport};
use mcplink_transport_traits::{TimeoutConfig, Transport, TransportError, TransportType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// One entry under `mcpServers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEntry(Map<String, Value>);

impl ServerEntry {
    /// Subprocess entry
    pub fn stdio<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<Value> = args.into_iter().map(|a| Value::String(a.into())).collect();
        Self::default()
            .with_field("command", command.into())
            .with_field("args", args)
    }

    /// HTTP entry; the URL decides between SSE and streamable HTTP
    pub fn url(url: impl Into<String>) -> Self {
        Self::default().with_field("url", url.into())
    }

    /// Set any member
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// A member by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `description` member, or `""`
    pub fn description(&self) -> &str {
        self.0
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// All members
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Pick the transport for this entry.
    pub fn classify(&self, name: &str) -> Result<ServerConfig> {
        let raw = Value::Object(self.0.clone());

        if self.0.contains_key("command") && self.0.contains_key("args") {
            let params: StdioServerParams = serde_json::from_value(raw)
                .map_err(|e| Error::invalid_config(name, e.to_string()))?;
            return Ok(ServerConfig::Stdio(params));
        }

        let Some(url) = self.0.get("url") else {
            return Err(Error::invalid_config(
                name,
                "expected 'command' and 'args', or 'url'",
            ));
        };
        let Some(url) = url.as_str() else {
            return Err(Error::invalid_config(name, "'url' must be a string"));
        };
        let headers = match self.0.get("headers") {
            Some(headers) => serde_json::from_value::<HashMap<String, String>>(headers.clone())
                .map_err(|e| Error::invalid_config(name, format!("headers: {e}")))?,
            None => HashMap::new(),
        };

        let config = if url.contains("sse") {
            let config = SseConfig {
                headers,
                ..SseConfig::new(url)
            };
            config.validate().map(|()| ServerConfig::Sse(config))
        } else if url.contains("mcp") {
            let config = StreamableHttpConfig {
                headers,
                ..StreamableHttpConfig::new(url)
            };
            config.validate().map(|()| ServerConfig::StreamableHttp(config))
        } else {
            return Err(Error::invalid_config(
                name,
                format!("cannot tell the transport of '{url}' (expected 'sse' or 'mcp' in the URL)"),
            ));
        };
        config.map_err(|e| match e {
            TransportError::ConfigurationError(reason) => Error::invalid_config(name, reason),
            other => Error::invalid_config(name, other.to_string()),
        })
    }
}

impl From<Map<String, Value>> for ServerEntry {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A classified server entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerConfig {
    /// Launch a subprocess
    Stdio(StdioServerParams),
    /// HTTP + SSE
    Sse(SseConfig),
    /// Streamable HTTP
    StreamableHttp(StreamableHttpConfig),
}

impl ServerConfig {
    /// Transport this config creates
    pub fn transport_type(&self) -> TransportType {
        match self {
            Self::Stdio(_) => TransportType::Stdio,
            Self::Sse(_) => TransportType::Sse,
            Self::StreamableHttp(_) => TransportType::StreamableHttp,
        }
    }

    /// Replace the timeouts of the underlying transport config
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        match &mut self {
            Self::Stdio(params) => params.timeouts = timeouts,
            Self::Sse(config) => config.timeouts = timeouts,
            Self::StreamableHttp(config) => config.timeouts = timeouts,
        }
        self
    }

    /// Build the (unconnected) transport.
    pub fn create_transport(self) -> Result<Box<dyn Transport>> {
        debug!(transport = %self.transport_type(), "Creating transport");
        Ok(match self {
            Self::Stdio(params) => Box::new(StdioTransport::new(params)),
            Self::Sse(config) => Box::new(SseTransport::new(config)?),
            Self::StreamableHttp(config) => Box::new(StreamableHttpTransport::new(config)?),
        })
    }
}

/// Contents of a config file: `{"mcpServers": {name: entry}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server entries by name
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

impl ClientConfig {
    /// Read and parse a config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Write as pretty-printed JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, text)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
