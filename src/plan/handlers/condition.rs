use async_trait::async_trait;
use serde_json::json;

use crate::plan::error::PlanError;

use super::{PlanExecutionContext, StepHandler, StepOutcome};

/// `condition`: config `{ "condition": string, "true_step": string, "false_step": string }`.
///
/// Supported `condition` syntax: `"true"`, `"false"`, `"result:<stepId>"`
/// (truthiness of that previous step's result).
pub struct ConditionHandler;

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

#[async_trait]
impl StepHandler for ConditionHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let condition = match ctx.step.config.get("condition").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return Ok(StepOutcome::failure("condition step requires 'condition'")),
        };

        let truthy = if condition == "true" {
            true
        } else if condition == "false" {
            false
        } else if let Some(step_id) = condition.strip_prefix("result:") {
            ctx.previous_results
                .get(step_id)
                .map(is_truthy)
                .unwrap_or(false)
        } else {
            return Ok(StepOutcome::failure(format!("unrecognised condition syntax: '{}'", condition)));
        };

        let target_key = if truthy { "true_step" } else { "false_step" };
        let target = ctx.step.config.get(target_key).and_then(|v| v.as_str());

        let mut outcome = StepOutcome::ok(json!({ "condition": condition, "result": truthy }));
        if let Some(target) = target {
            outcome = outcome.with_next_step(target);
        }
        Ok(outcome)
    }
}
