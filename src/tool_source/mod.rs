//! Tool source boundary: specs, call context, and errors shared by the
//! [`Tool`](crate::tools::Tool) trait and the [`ToolRegistry`](crate::tools::ToolRegistry).

mod context;

pub use context::ToolCallContext;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tool specification exposed to the LLM (and to `get_tool_help`): name,
/// description, and a JSON-Schema-shaped parameter object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub requires_approval: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
            category: None,
            tags: Vec::new(),
            requires_approval: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_approval_required(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    /// Required top-level parameter names, read from `input_schema.required`.
    pub fn required_params(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `properties` object of the schema, if present.
    pub fn properties(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.input_schema.get("properties").and_then(|v| v.as_object())
    }
}

/// Result of a tool call: plain-text content (the result surfaced to the LLM).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallContent {
    pub text: String,
}

impl ToolCallContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Errors a tool (or the dispatcher wrapping it) can return.
///
/// Never allowed to propagate out of `ToolRegistry::execute` as a panic; every
/// variant here is surfaced to the LLM as a tool-result error string.
#[derive(Debug, Error, Clone)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("execution error: {0}")]
    Execution(String),
}
