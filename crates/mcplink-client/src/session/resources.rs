//! `resources/*`

use mcplink_protocol::Method;
use mcplink_protocol::types::{
    Cursor, ListResourceTemplatesResult, ListResourcesResult, PaginatedParams,
    ReadResourceParams, ReadResourceResult, SubscribeParams, UnsubscribeParams,
};
use serde_json::Value;

use super::Session;
use crate::error::Result;

impl Session {
    /// One page of resources
    pub async fn list_resources(&self, cursor: Option<Cursor>) -> Result<ListResourcesResult> {
        self.call(Method::ListResources, Some(PaginatedParams::new(cursor)))
            .await
    }

    /// One page of resource templates
    pub async fn list_resource_templates(
        &self,
        cursor: Option<Cursor>,
    ) -> Result<ListResourceTemplatesResult> {
        self.call(
            Method::ListResourceTemplates,
            Some(PaginatedParams::new(cursor)),
        )
        .await
    }

    /// Contents of the resource at `uri`
    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<ReadResourceResult> {
        let params = ReadResourceParams { uri: uri.into() };
        self.call(Method::ReadResource, Some(params)).await
    }

    /// Ask for `notifications/resources/updated` about `uri`.
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> Result<()> {
        let params = SubscribeParams { uri: uri.into() };
        self.call::<_, Value>(Method::Subscribe, Some(params))
            .await
            .map(drop)
    }

    /// Undo [`Session::subscribe_resource`].
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> Result<()> {
        let params = UnsubscribeParams { uri: uri.into() };
        self.call::<_, Value>(Method::Unsubscribe, Some(params))
            .await
            .map(drop)
    }
}
