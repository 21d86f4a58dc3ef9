//! Server-initiated user input requests (`elicitation/create`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Params of `elicitation/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitRequest {
    /// Text shown to the user
    pub message: String,
    /// Flat JSON Schema describing the expected answer
    pub requested_schema: Value,
}

/// How the user responded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    /// The user submitted the form
    Accept,
    /// The user explicitly refused
    Decline,
    /// The user dismissed the request
    Cancel,
}

/// Result of `elicitation/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitResult {
    /// User action
    pub action: ElicitAction,
    /// Submitted values, present only on accept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Map<String, Value>>,
}

impl ElicitResult {
    /// The user accepted with `content`
    pub fn accept(content: Map<String, Value>) -> Self {
        Self {
            action: ElicitAction::Accept,
            content: Some(content),
        }
    }

    /// The user declined
    pub fn decline() -> Self {
        Self {
            action: ElicitAction::Decline,
            content: None,
        }
    }

    /// The user cancelled
    pub fn cancel() -> Self {
        Self {
            action: ElicitAction::Cancel,
            content: None,
        }
    }
}
