//! Launch parameters for a subprocess server.

use std::collections::HashMap;
use std::path::PathBuf;

use mcplink_transport_traits::TimeoutConfig;
use serde::{Deserialize, Serialize};

/// How to start a server process.
///
/// Deserializes from the `command`/`args`/`env`/`cwd` members of a server
/// entry; unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioServerParams {
    /// Executable to run
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment, merged over the inherited allow-list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    /// Working directory of the child
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Request, connect and shutdown timeouts
    #[serde(skip)]
    pub timeouts: TimeoutConfig,
}

impl StdioServerParams {
    /// Run `command` with `args`
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: None,
            cwd: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Add one environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Run the child in `cwd`
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Replace the timeouts
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_server_entry() {
        let params: StdioServerParams = serde_json::from_value(json!({
            "command": "uvx",
            "args": ["mcp-server-time", "--local-timezone=UTC"],
            "env": {"DEBUG": "1"},
            "description": "ignored here"
        }))
        .unwrap();

        assert_eq!(
            params,
            StdioServerParams::new("uvx", ["mcp-server-time", "--local-timezone=UTC"])
                .with_env("DEBUG", "1")
        );
    }

    #[test]
    fn test_serialization_omits_unset_members() {
        let params = StdioServerParams::new("node", ["server.js"]);
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"command": "node", "args": ["server.js"]})
        );
    }
}
