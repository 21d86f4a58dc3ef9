//! Named servers and their open sessions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;

use mcplink_protocol::types::Implementation;
use mcplink_transport_traits::{CapabilityCallbacks, TimeoutConfig};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ServerEntry};
use crate::error::{Error, Result};
use crate::session::Session;

/// Name the registry identifies itself with unless told otherwise
pub const DEFAULT_CLIENT_NAME: &str = "MCP Client";
/// Version the registry identifies itself with unless told otherwise
pub const DEFAULT_CLIENT_VERSION: &str = "0.1.0";

/// Summary of one configured server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerMetadata {
    /// Config key
    pub name: String,
    /// The entry's `description`, or `""`
    pub description: String,
    /// Whether a session is open
    pub connected: bool,
}

/// A set of configured servers, each with at most one open [`Session`].
///
/// ```rust,no_run
/// use mcplink_client::McpClient;
///
/// # async fn example() -> mcplink_client::Result<()> {
/// let client = McpClient::from_config_file("servers.json").await?;
/// let session = client.create_session("calculator").await?;
/// let tools = session.list_tools(None).await?;
/// println!("{} tools", tools.tools.len());
/// client.close_all_sessions().await;
/// # Ok(())
/// # }
/// ```
pub struct McpClient {
    config: ClientConfig,
    client_info: Implementation,
    callbacks: CapabilityCallbacks,
    timeouts: Option<TimeoutConfig>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("servers", &self.server_names())
            .field("client_info", &self.client_info)
            .field("callbacks", &self.callbacks)
            .field("sessions", &self.sessions.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::from_config(ClientConfig::default())
    }
}

impl McpClient {
    /// Registry over an in-memory config
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            client_info: Implementation::new(DEFAULT_CLIENT_NAME, DEFAULT_CLIENT_VERSION),
            callbacks: CapabilityCallbacks::default(),
            timeouts: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registry over a `{"mcpServers": {...}}` file
    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_config(ClientConfig::load(path).await?))
    }

    /// Identity sent in `initialize` by new sessions
    #[must_use]
    pub fn with_client_info(mut self, client_info: Implementation) -> Self {
        self.client_info = client_info;
        self
    }

    /// Callbacks attached to every new session
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: CapabilityCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Timeouts for every new transport
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// The current config
    pub fn to_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Write the current config
    pub async fn to_config_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.config.save(path).await
    }

    /// Configured server names, sorted
    pub fn server_names(&self) -> Vec<String> {
        self.config.mcp_servers.keys().cloned().collect()
    }

    /// Name, description and connection status of each server
    pub fn servers_metadata(&self) -> Vec<ServerMetadata> {
        self.config
            .mcp_servers
            .iter()
            .map(|(name, entry)| ServerMetadata {
                name: name.clone(),
                description: entry.description().to_string(),
                connected: self.is_connected(name),
            })
            .collect()
    }

    /// Add or replace a server entry. An open session for `name` keeps
    /// running on the old entry until closed.
    pub fn add_server(&mut self, name: impl Into<String>, entry: ServerEntry) {
        self.config.mcp_servers.insert(name.into(), entry);
    }

    /// Close the server's session, if any, and drop its entry.
    pub async fn remove_server(&mut self, name: &str) -> Result<ServerEntry> {
        if !self.config.mcp_servers.contains_key(name) {
            return Err(Error::UnknownServer(name.to_string()));
        }
        if self.is_connected(name) {
            self.close_session(name).await?;
        }
        self.config
            .mcp_servers
            .remove(name)
            .ok_or_else(|| Error::UnknownServer(name.to_string()))
    }

    /// Classify the entry, connect and initialize.
    ///
    /// A session that is already open is returned as is.
    pub async fn create_session(&self, name: &str) -> Result<Arc<Session>> {
        if self.config.mcp_servers.is_empty() {
            return Err(Error::NoServers);
        }
        if let Some(session) = self.session(name) {
            return Ok(session);
        }
        let entry = self
            .config
            .mcp_servers
            .get(name)
            .ok_or_else(|| Error::UnknownServer(name.to_string()))?;

        let mut server = entry.classify(name)?;
        if let Some(timeouts) = self.timeouts {
            server = server.with_timeouts(timeouts);
        }
        info!(server = name, transport = %server.transport_type(), "Opening session");

        let session = Session::from_boxed(server.create_transport()?, self.client_info.clone());
        session.attach_callbacks(self.callbacks.clone())?;
        let opened = async {
            session.connect().await?;
            session.initialize().await.map(drop)
        }
        .await;
        if let Err(e) = opened {
            warn!(server = name, error = %e, "Session setup failed");
            let _ = session.shutdown().await;
            return Err(e);
        }

        Ok(self.adopt(name, Arc::new(session)).await)
    }

    /// Record `session` as the open session for `name`.
    ///
    /// When a concurrent `create_session` got there first, `session` is shut
    /// down and the session already recorded is returned instead.
    async fn adopt(&self, name: &str, session: Arc<Session>) -> Arc<Session> {
        let existing = match self.sessions.lock().entry(name.to_string()) {
            Entry::Occupied(slot) => Arc::clone(slot.get()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&session));
                return session;
            }
        };
        debug!(server = name, "Session opened concurrently; closing the duplicate");
        if let Err(e) = session.shutdown().await {
            warn!(server = name, error = %e, "Closing duplicate session failed");
        }
        existing
    }

    /// The open session for `name`
    pub fn session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(name).cloned()
    }

    /// Whether `name` has an open session
    pub fn is_connected(&self, name: &str) -> bool {
        self.sessions.lock().contains_key(name)
    }

    /// Shut down and forget the session for `name`.
    pub async fn close_session(&self, name: &str) -> Result<()> {
        let session = self
            .sessions
            .lock()
            .remove(name)
            .ok_or_else(|| Error::NoSession(name.to_string()))?;
        session.shutdown().await?;
        info!(server = name, "Session closed");
        Ok(())
    }

    /// Open a session for every server, in name order. Stops at the first
    /// failure; sessions opened before it stay open.
    pub async fn create_all_sessions(&self) -> Result<Vec<Arc<Session>>> {
        let mut opened = Vec::with_capacity(self.config.mcp_servers.len());
        for name in self.config.mcp_servers.keys() {
            opened.push(self.create_session(name).await?);
        }
        Ok(opened)
    }

    /// Shut down every open session.
    pub async fn close_all_sessions(&self) {
        let sessions: Vec<(String, Arc<Session>)> = self.sessions.lock().drain().collect();
        let closing = sessions.iter().map(|(name, session)| async move {
            if let Err(e) = session.shutdown().await {
                warn!(server = %name, error = %e, "Session shutdown failed");
            }
        });
        futures::future::join_all(closing).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use mcplink_stdio::StdioTransport;
    use pretty_assertions::assert_eq;

    fn registry() -> McpClient {
        let mut config = ClientConfig::default();
        config.mcp_servers.insert(
            "weather".into(),
            ServerEntry::url("http://localhost:8000/sse").with_field("description", "Weather"),
        );
        config
            .mcp_servers
            .insert("calc".into(), ServerEntry::stdio("python", ["calc.py"]));
        McpClient::from_config(config)
    }

    #[test]
    fn test_names_and_metadata() {
        let client = registry();
        assert_eq!(client.server_names(), vec!["calc", "weather"]);
        assert_eq!(
            client.servers_metadata(),
            vec![
                ServerMetadata {
                    name: "calc".into(),
                    description: String::new(),
                    connected: false,
                },
                ServerMetadata {
                    name: "weather".into(),
                    description: "Weather".into(),
                    connected: false,
                },
            ]
        );
        assert_eq!(client.client_info.name, "MCP Client");
        assert_eq!(client.client_info.version, "0.1.0");
    }

    #[tokio::test]
    async fn test_lookup_failures() {
        let client = McpClient::default();
        assert!(matches!(
            client.create_session("calc").await,
            Err(Error::NoServers)
        ));

        let client = registry();
        assert!(matches!(
            client.create_session("nope").await,
            Err(Error::UnknownServer(name)) if name == "nope"
        ));
        assert!(matches!(
            client.close_session("calc").await,
            Err(Error::NoSession(_))
        ));
        assert!(client.session("calc").is_none());
    }

    #[tokio::test]
    async fn test_losing_concurrent_session_is_shut_down() {
        let client = registry();
        let idle = || {
            let (ours, _theirs) = tokio::io::duplex(64);
            let (read, write) = tokio::io::split(ours);
            Arc::new(Session::new(
                StdioTransport::from_raw(read, write),
                client.client_info.clone(),
            ))
        };
        let first = idle();
        let second = idle();

        let kept = client.adopt("calc", Arc::clone(&first)).await;
        assert!(Arc::ptr_eq(&kept, &first));

        let kept = client.adopt("calc", Arc::clone(&second)).await;
        assert!(Arc::ptr_eq(&kept, &first));
        assert_eq!(second.state(), SessionState::Closed);
        assert_eq!(first.state(), SessionState::Unconnected);
        assert!(Arc::ptr_eq(&client.session("calc").unwrap(), &first));
    }

    #[tokio::test]
    async fn test_bad_entry_is_rejected_before_connecting() {
        let mut client = registry();
        client.add_server("rpc", ServerEntry::url("http://localhost:9/rpc"));
        assert!(matches!(
            client.create_session("rpc").await,
            Err(Error::InvalidServerConfig { .. })
        ));
        assert!(!client.is_connected("rpc"));

        let removed = client.remove_server("rpc").await.unwrap();
        assert_eq!(removed, ServerEntry::url("http://localhost:9/rpc"));
        assert!(matches!(
            client.remove_server("rpc").await,
            Err(Error::UnknownServer(_))
        ));
    }
}
