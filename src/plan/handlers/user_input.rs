use async_trait::async_trait;
use serde_json::json;

use crate::plan::error::PlanError;

use super::{PlanExecutionContext, StepHandler, StepOutcome};

/// `user_input`: config `{ "question": string, "input_type": string?, "options": [string]? }`.
///
/// Always succeeds immediately with the question payload and `shouldPause`,
/// handing control back to whatever drives the plan (a UI, a chat turn) to
/// collect the answer before `resume`.
pub struct UserInputHandler;

#[async_trait]
impl StepHandler for UserInputHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let question = ctx
            .step
            .config
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let input_type = ctx
            .step
            .config
            .get("input_type")
            .and_then(|v| v.as_str())
            .unwrap_or("text")
            .to_string();
        let options = ctx.step.config.get("options").cloned().unwrap_or_else(|| json!([]));

        Ok(StepOutcome::ok(json!({
            "question": question,
            "input_type": input_type,
            "options": options,
        }))
        .pausing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::{Plan, Step};
    use tokio::sync::watch;

    /// **Scenario**: user_input always pauses the plan after producing its question payload.
    #[tokio::test]
    async fn user_input_pauses_with_question() {
        let (_tx, rx) = watch::channel(false);
        let ctx = PlanExecutionContext {
            plan: Plan::new("p1", "u1", "n", "g", 1),
            step: Step::new("s1", "p1", 1, "user_input", "ask", json!({ "question": "continue?" })),
            previous_results: Default::default(),
            cancellation: rx,
        };
        let outcome = UserInputHandler.handle(&ctx).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.should_pause);
        assert_eq!(outcome.data.unwrap()["question"], "continue?");
    }
}
