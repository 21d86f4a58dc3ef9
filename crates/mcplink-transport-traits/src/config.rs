//! Transport configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts applied by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment, including waiting for the SSE endpoint event.
    pub connect: Duration,

    /// How long a request waits for its response.
    pub request: Duration,

    /// How long a child process gets to exit after stdin is closed.
    pub shutdown: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Duration::from_secs(30),
            shutdown: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    /// Same defaults with a different request timeout
    #[must_use]
    pub const fn with_request(mut self, request: Duration) -> Self {
        self.request = request;
        self
    }

    /// Same defaults with a different connect timeout
    #[must_use]
    pub const fn with_connect(mut self, connect: Duration) -> Self {
        self.connect = connect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeout_config_default() {
        let config = TimeoutConfig::default();
        assert_eq!(config.connect, Duration::from_secs(30));
        assert_eq!(config.request, Duration::from_secs(30));
        assert_eq!(config.shutdown, Duration::from_secs(5));
    }

    #[test]
    fn test_builders() {
        let config = TimeoutConfig::default().with_request(Duration::from_millis(50));
        assert_eq!(config.request, Duration::from_millis(50));
        assert_eq!(config.connect, Duration::from_secs(30));
    }
}
