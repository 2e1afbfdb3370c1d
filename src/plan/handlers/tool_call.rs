use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::plan::error::PlanError;
use crate::tool_source::ToolCallContext;
use crate::tools::{ToolRegistry, UseToolTool};

use super::{PlanExecutionContext, StepHandler, StepOutcome};

/// `tool_call`: config `{ "tool_name": string, "tool_args": object }`.
///
/// Invokes the shared tool registry directly (not through the meta-tool
/// wrapper — the plan already knows the concrete tool name), forwarding
/// `userId` via [`ToolCallContext`]. Shares validation (unknown name, missing
/// params, size cap) with `use_tool` via [`UseToolTool::run_one`].
pub struct ToolCallHandler {
    registry: Arc<ToolRegistry>,
}

impl ToolCallHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepHandler for ToolCallHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let tool_name = match ctx.step.config.get("tool_name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => return Ok(StepOutcome::failure("tool_call step requires 'tool_name'")),
        };
        let tool_args = ctx.step.config.get("tool_args").cloned().unwrap_or_else(|| json!({}));

        let call_ctx = ToolCallContext::new(Vec::new()).with_user_id(ctx.plan.user_id.clone());

        match UseToolTool::run_one(&self.registry, &tool_name, tool_args, Some(&call_ctx)).await {
            Ok(content) => Ok(StepOutcome::ok(json!({ "text": content.text }))),
            Err(e) => Ok(StepOutcome::failure(e.to_string())),
        }
    }
}
