//! `prompts/*`

use std::collections::HashMap;

use mcplink_protocol::Method;
use mcplink_protocol::types::{
    Cursor, GetPromptParams, GetPromptResult, ListPromptsResult, PaginatedParams,
};

use super::Session;
use crate::error::Result;

impl Session {
    /// One page of prompts
    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> Result<ListPromptsResult> {
        self.call(Method::ListPrompts, Some(PaginatedParams::new(cursor)))
            .await
    }

    /// Render a prompt with its template arguments
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult> {
        let params = GetPromptParams {
            name: name.into(),
            arguments,
        };
        self.call(Method::GetPrompt, Some(params)).await
    }
}
