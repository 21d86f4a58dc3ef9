//! Shared building blocks used by several feature areas.

use serde::{Deserialize, Serialize};

/// Opaque pagination token handed back by list operations.
pub type Cursor = String;

/// Name and version of a client or server implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Programmatic name
    pub name: String,
    /// Human readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Version string
    pub version: String,
}

impl Implementation {
    /// Identity with just a name and a version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            version: version.into(),
        }
    }
}

/// Message author in prompts and sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation
    User,
    /// The model side of the conversation
    Assistant,
}

/// Params shared by every `*/list` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedParams {
    /// Position to resume from, as returned in a previous `nextCursor`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl PaginatedParams {
    /// Params for the page after `cursor`, or the first page
    pub fn new(cursor: Option<Cursor>) -> Self {
        Self { cursor }
    }
}
