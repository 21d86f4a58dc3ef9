//! Ping, completion, logging and roots notifications.

use mcplink_protocol::Method;
use mcplink_protocol::types::{CompleteRequestParams, CompleteResult, LogLevel, SetLevelParams};
use serde_json::Value;

use super::{Session, SessionState};
use crate::error::Result;

impl Session {
    /// Round trip an empty request.
    pub async fn ping(&self) -> Result<()> {
        self.call::<Value, Value>(Method::Ping, None)
            .await
            .map(drop)
    }

    /// Argument completion for a prompt or resource template
    pub async fn complete(&self, params: CompleteRequestParams) -> Result<CompleteResult> {
        self.call(Method::Complete, Some(params)).await
    }

    /// Lowest severity the server should send as `notifications/message`
    pub async fn set_logging_level(&self, level: LogLevel) -> Result<()> {
        self.call::<_, Value>(Method::SetLevel, Some(SetLevelParams { level }))
            .await
            .map(drop)
    }

    /// Tell the server the roots returned by `roots/list` changed.
    pub async fn send_roots_list_changed(&self) -> Result<()> {
        self.expect_state(
            Method::RootsListChanged.as_str(),
            SessionState::Initialized,
        )?;
        self.notify(Method::RootsListChanged, None).await
    }
}
