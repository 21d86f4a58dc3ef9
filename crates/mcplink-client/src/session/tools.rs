//! `tools/*`

use mcplink_protocol::Method;
use mcplink_protocol::types::{
    CallToolParams, CallToolResult, Cursor, ListToolsResult, PaginatedParams,
};
use serde_json::{Map, Value};

use super::Session;
use crate::error::Result;

impl Session {
    /// One page of the server's tools. Pass the previous page's
    /// `next_cursor` to continue.
    pub async fn list_tools(&self, cursor: Option<Cursor>) -> Result<ListToolsResult> {
        self.call(Method::ListTools, Some(PaginatedParams::new(cursor)))
            .await
    }

    /// Invoke a tool.
    ///
    /// A tool that ran but failed reports it through
    /// [`CallToolResult::is_error`]; only protocol and transport problems
    /// are returned as `Err`.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.into(),
            arguments,
        };
        self.call(Method::CallTool, Some(params)).await
    }
}
