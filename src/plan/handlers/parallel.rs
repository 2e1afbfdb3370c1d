use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::plan::error::PlanError;
use crate::tool_source::ToolCallContext;
use crate::tools::{ToolRegistry, UseToolTool};

use super::{PlanExecutionContext, StepHandler, StepOutcome};

const DEFAULT_MAX_CONCURRENT: usize = 5;

/// One entry of the `parallel` step's `steps` array: either a bare tool name,
/// or `{ "tool_name": ..., "tool_args": ... }`.
fn parse_call(entry: &serde_json::Value) -> Option<(String, serde_json::Value)> {
    if let Some(name) = entry.as_str() {
        return Some((name.to_string(), json!({})));
    }
    let name = entry.get("tool_name").and_then(|v| v.as_str())?;
    let args = entry.get("tool_args").cloned().unwrap_or_else(|| json!({}));
    Some((name.to_string(), args))
}

/// `parallel`: config `{ "steps": [string | {tool_name, tool_args}], "max_concurrent": number? }`.
///
/// Batches execution in groups of `max_concurrent` (default 5), settle-all
/// semantics per batch. Overall success iff every inner call succeeds.
pub struct ParallelHandler {
    registry: Arc<ToolRegistry>,
}

impl ParallelHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepHandler for ParallelHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let entries = match ctx.step.config.get("steps").and_then(|v| v.as_array()) {
            Some(e) => e,
            None => return Ok(StepOutcome::failure("parallel step requires 'steps'")),
        };
        let max_concurrent = ctx
            .step
            .config
            .get("max_concurrent")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
            .max(1);

        let calls: Vec<(String, serde_json::Value)> = entries.iter().filter_map(parse_call).collect();
        if calls.len() != entries.len() {
            return Ok(StepOutcome::failure("parallel step has a malformed entry in 'steps'"));
        }

        let call_ctx = ToolCallContext::new(Vec::new()).with_user_id(ctx.plan.user_id.clone());
        let mut results = Vec::with_capacity(calls.len());
        let mut all_ok = true;

        for batch in calls.chunks(max_concurrent) {
            let mut handles = Vec::with_capacity(batch.len());
            for (name, args) in batch {
                let registry = Arc::clone(&self.registry);
                let name = name.clone();
                let args = args.clone();
                let ctx_owned = call_ctx.clone();
                handles.push(tokio::spawn(async move {
                    let result = UseToolTool::run_one(&registry, &name, args, Some(&ctx_owned)).await;
                    (name, result)
                }));
            }
            for h in handles {
                let (name, result) = h
                    .await
                    .map_err(|e| PlanError::Repository(format!("parallel task join failed: {}", e)))?;
                match result {
                    Ok(content) => results.push(json!({ "tool_name": name, "ok": true, "result": content.text })),
                    Err(e) => {
                        all_ok = false;
                        results.push(json!({ "tool_name": name, "ok": false, "error": e.to_string() }));
                    }
                }
            }
        }

        if all_ok {
            Ok(StepOutcome::ok(json!({ "results": results })))
        } else {
            Ok(StepOutcome {
                success: false,
                data: Some(json!({ "results": results })),
                error: Some("one or more parallel calls failed".to_string()),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::{Plan, Step};
    use async_trait::async_trait as _async_trait;
    use tokio::sync::watch;

    struct AlwaysOk;
    #[_async_trait]
    impl crate::tools::Tool for AlwaysOk {
        fn name(&self) -> &str {
            "always_ok"
        }
        fn spec(&self) -> crate::tool_source::ToolSpec {
            crate::tool_source::ToolSpec::new("always_ok", "ok", json!({"type": "object", "properties": {}}))
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<crate::tool_source::ToolCallContent, crate::tool_source::ToolSourceError> {
            Ok(crate::tool_source::ToolCallContent::text("ok"))
        }
    }

    fn fixture(steps: serde_json::Value) -> (Arc<ToolRegistry>, PlanExecutionContext) {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(AlwaysOk), "core", false).unwrap();
        let (_tx, rx) = watch::channel(false);
        (
            registry,
            PlanExecutionContext {
                plan: Plan::new("p1", "u1", "n", "g", 1),
                step: Step::new("s1", "p1", 1, "parallel", "fanout", json!({ "steps": steps })),
                previous_results: Default::default(),
                cancellation: rx,
            },
        )
    }

    /// **Scenario**: all-successful parallel calls report overall success.
    #[tokio::test]
    async fn parallel_all_ok_succeeds() {
        let (registry, ctx) = fixture(json!(["always_ok", "always_ok"]));
        let handler = ParallelHandler::new(registry);
        let outcome = handler.handle(&ctx).await.unwrap();
        assert!(outcome.success);
    }

    /// **Scenario**: one unknown tool among the batch makes the whole step fail.
    #[tokio::test]
    async fn parallel_one_unknown_tool_fails_overall() {
        let (registry, ctx) = fixture(json!(["always_ok", "missing_tool"]));
        let handler = ParallelHandler::new(registry);
        let outcome = handler.handle(&ctx).await.unwrap();
        assert!(!outcome.success);
    }
}
