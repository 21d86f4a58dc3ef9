//! Protocol method names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MessageError;

/// Every method the client sends or answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `notifications/initialized`
    Initialized,
    /// `ping`
    Ping,
    /// `tools/list`
    ListTools,
    /// `tools/call`
    CallTool,
    /// `resources/list`
    ListResources,
    /// `resources/templates/list`
    ListResourceTemplates,
    /// `resources/read`
    ReadResource,
    /// `resources/subscribe`
    Subscribe,
    /// `resources/unsubscribe`
    Unsubscribe,
    /// `prompts/list`
    ListPrompts,
    /// `prompts/get`
    GetPrompt,
    /// `completion/complete`
    Complete,
    /// `logging/setLevel`
    SetLevel,
    /// `sampling/createMessage` (server to client)
    CreateMessage,
    /// `elicitation/create` (server to client)
    Elicit,
    /// `roots/list` (server to client)
    ListRoots,
    /// `notifications/roots/list_changed`
    RootsListChanged,
    /// `notifications/message` (server log records)
    LogMessage,
}

impl Method {
    /// All known methods
    pub const ALL: [Method; 19] = [
        Method::Initialize,
        Method::Initialized,
        Method::Ping,
        Method::ListTools,
        Method::CallTool,
        Method::ListResources,
        Method::ListResourceTemplates,
        Method::ReadResource,
        Method::Subscribe,
        Method::Unsubscribe,
        Method::ListPrompts,
        Method::GetPrompt,
        Method::Complete,
        Method::SetLevel,
        Method::CreateMessage,
        Method::Elicit,
        Method::ListRoots,
        Method::RootsListChanged,
        Method::LogMessage,
    ];

    /// Wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Initialized => "notifications/initialized",
            Method::Ping => "ping",
            Method::ListTools => "tools/list",
            Method::CallTool => "tools/call",
            Method::ListResources => "resources/list",
            Method::ListResourceTemplates => "resources/templates/list",
            Method::ReadResource => "resources/read",
            Method::Subscribe => "resources/subscribe",
            Method::Unsubscribe => "resources/unsubscribe",
            Method::ListPrompts => "prompts/list",
            Method::GetPrompt => "prompts/get",
            Method::Complete => "completion/complete",
            Method::SetLevel => "logging/setLevel",
            Method::CreateMessage => "sampling/createMessage",
            Method::Elicit => "elicitation/create",
            Method::ListRoots => "roots/list",
            Method::RootsListChanged => "notifications/roots/list_changed",
            Method::LogMessage => "notifications/message",
        }
    }

    /// Whether the method is sent without an id
    pub const fn is_notification(self) -> bool {
        matches!(
            self,
            Method::Initialized | Method::RootsListChanged | Method::LogMessage
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| MessageError::malformed(format!("unknown method '{s}'")))
    }
}

impl Serialize for Method {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
