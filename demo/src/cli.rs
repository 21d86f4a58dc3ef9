//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Talk to the MCP servers listed in a config file
#[derive(Parser, Debug)]
#[command(name = "mcplink-demo", version, about)]
pub(crate) struct Cli {
    /// Config file with an `mcpServers` object
    #[arg(long, short = 'c', env = "MCPLINK_CONFIG", default_value = "servers.json")]
    pub(crate) config: PathBuf,

    /// Server to use; may be omitted when the config has exactly one
    #[arg(long, short = 's', global = true)]
    pub(crate) server: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub(crate) timeout: u64,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List configured servers
    Servers,
    /// List the server's tools
    Tools,
    /// Call a tool with JSON object arguments
    Call {
        /// Tool name
        name: String,
        /// Arguments, e.g. '{"a": 10, "b": 20}'
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// List the server's resources
    Resources,
    /// Read one resource
    Read {
        /// Resource URI
        uri: String,
    },
    /// List the server's prompts
    Prompts,
}
