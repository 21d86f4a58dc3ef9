//! Argument autocompletion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What is being completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// An argument of a prompt
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// Prompt name
        name: String,
    },
    /// A variable of a resource template
    #[serde(rename = "ref/resource")]
    Resource {
        /// URI template
        uri: String,
    },
}

/// The argument being typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionArgument {
    /// Argument name
    pub name: String,
    /// Partial value
    pub value: String,
}

/// Already resolved arguments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionContext {
    /// Argument values keyed by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// Params of `completion/complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequestParams {
    /// Prompt or resource template
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// Argument to complete
    pub argument: CompletionArgument,
    /// Other arguments already filled in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<CompletionContext>,
}

/// Result of `completion/complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteResult {
    /// Suggestions
    pub completion: Completion,
}

/// Suggested values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// At most 100 values
    pub values: Vec<String>,
    /// Total number of matches, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    /// More values exist than were returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}
