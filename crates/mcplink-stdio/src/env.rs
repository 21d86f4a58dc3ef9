//! Platform shim for launching server processes
//!
//! The child never inherits the whole parent environment: only a small
//! allow-list of variables needed to find executables and a home directory,
//! overlaid with what the server entry configures. On Windows `npx` is a
//! batch script and must be started through `cmd /c`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::StdioServerParams;

/// Variables passed through on Unix-like systems
const UNIX_INHERITED: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

/// Variables passed through on Windows
const WINDOWS_INHERITED: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PATHEXT",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// Operating system family the child is launched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux, macOS and other Unix-like systems
    Unix,
    /// Windows
    Windows,
}

impl Platform {
    /// The platform this binary was built for
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Variables the child inherits from the parent
    pub const fn inherited_variables(self) -> &'static [&'static str] {
        match self {
            Self::Unix => UNIX_INHERITED,
            Self::Windows => WINDOWS_INHERITED,
        }
    }
}

/// Allow-listed variables taken from `lookup`.
///
/// Values starting with `()` are shell function exports and are skipped.
fn inherited_environment<F>(platform: Platform, lookup: F) -> HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    platform
        .inherited_variables()
        .iter()
        .filter_map(|key| {
            let value = lookup(key)?;
            (!value.starts_with("()")).then(|| ((*key).to_string(), value))
        })
        .collect()
}

/// Allow-listed variables of the current process.
pub fn default_environment(platform: Platform) -> HashMap<String, String> {
    inherited_environment(platform, |key| std::env::var(key).ok())
}

/// Fully resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program to execute
    pub program: String,
    /// Its arguments
    pub args: Vec<String>,
    /// The complete child environment
    pub env: HashMap<String, String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    /// Resolve `params` for `platform` using the current process environment
    pub fn resolve(params: &StdioServerParams, platform: Platform) -> Self {
        Self::resolve_with(params, platform, default_environment(platform))
    }

    fn resolve_with(
        params: &StdioServerParams,
        platform: Platform,
        mut env: HashMap<String, String>,
    ) -> Self {
        if let Some(configured) = &params.env {
            env.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let (program, args) = match platform {
            Platform::Windows if params.command == "npx" => {
                let mut args = vec!["/c".to_string(), "npx".to_string()];
                args.extend(params.args.iter().cloned());
                ("cmd".to_string(), args)
            }
            _ => (params.command.clone(), params.args.clone()),
        };

        Self {
            program,
            args,
            env,
            cwd: params.cwd.clone(),
        }
    }

    /// `program arg1 arg2 ...`, for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
