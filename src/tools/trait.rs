use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};

/// A single concrete tool that can be called through the dispatcher.
///
/// Concrete tools are never exposed directly to the LLM (spec.md §2): the LLM
/// only ever sees the 4 meta-tool schemas, and reaches a concrete tool via
/// `use_tool`/`batch_use_tool`. The registry holds tools behind this trait so
/// `search_tools`/`get_tool_help` can inspect their [`ToolSpec`] without
/// knowing the concrete type.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use gateway_core::tools::Tool;
/// use gateway_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn spec(&self) -> ToolSpec {
///         ToolSpec::new("echo", "Echoes the input text back", serde_json::json!({
///             "type": "object",
///             "properties": { "text": { "type": "string" } },
///             "required": ["text"],
///         }))
///     }
///
///     async fn call(
///         &self,
///         args: Value,
///         _ctx: Option<&ToolCallContext>,
///     ) -> Result<ToolCallContent, ToolSourceError> {
///         let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
///         Ok(ToolCallContent::text(text))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name. Must match `^[a-z][a-z0-9_]*$` (spec.md §2 naming rule) and
    /// be unique across all tools registered in a [`ToolRegistry`](super::ToolRegistry).
    fn name(&self) -> &str;

    /// Specification surfaced by `search_tools`/`get_tool_help` and used to
    /// validate arguments before `call` runs.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with the given arguments and optional per-call context.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSourceError`] for invalid arguments, execution failures,
    /// or transport failures. Never panics on bad input; panics are reserved
    /// for genuine programmer errors.
    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;
}
