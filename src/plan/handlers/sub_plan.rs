use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::plan::error::PlanError;
use crate::plan::model::PlanStatus;

use super::{PlanExecutionContext, StepHandler, StepOutcome};

/// The subset of [`PlanExecutor`](crate::plan::PlanExecutor) that `sub_plan`
/// needs, so this module doesn't depend on the executor directly (the
/// executor is itself what registers this handler).
#[async_trait]
pub trait SubPlanRunner: Send + Sync {
    async fn run_sub_plan(&self, plan_id: &str) -> Result<PlanStatus, PlanError>;
}

/// `sub_plan`: config `{ "sub_plan_id": string }`.
///
/// Recursively invokes the executor on the child plan; the child's terminal
/// status determines this step's success.
pub struct SubPlanHandler {
    runner: Arc<dyn SubPlanRunner>,
}

impl SubPlanHandler {
    pub fn new(runner: Arc<dyn SubPlanRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl StepHandler for SubPlanHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let sub_plan_id = match ctx.step.config.get("sub_plan_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return Ok(StepOutcome::failure("sub_plan step requires 'sub_plan_id'")),
        };

        let status = self.runner.run_sub_plan(&sub_plan_id).await?;
        match status {
            PlanStatus::Completed => Ok(StepOutcome::ok(json!({ "sub_plan_id": sub_plan_id, "status": "completed" }))),
            other => Ok(StepOutcome::failure(format!(
                "sub-plan '{}' ended with status {:?}",
                sub_plan_id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::{Plan, Step};
    use tokio::sync::watch;

    struct FixedRunner(PlanStatus);

    #[async_trait]
    impl SubPlanRunner for FixedRunner {
        async fn run_sub_plan(&self, _plan_id: &str) -> Result<PlanStatus, PlanError> {
            Ok(self.0)
        }
    }

    fn fixture_ctx() -> PlanExecutionContext {
        let (_tx, rx) = watch::channel(false);
        PlanExecutionContext {
            plan: Plan::new("p1", "u1", "n", "g", 1),
            step: Step::new("s1", "p1", 1, "sub_plan", "run child", json!({ "sub_plan_id": "child-1" })),
            previous_results: Default::default(),
            cancellation: rx,
        }
    }

    /// **Scenario**: a sub-plan that completes makes the sub_plan step succeed.
    #[tokio::test]
    async fn sub_plan_completed_succeeds() {
        let handler = SubPlanHandler::new(Arc::new(FixedRunner(PlanStatus::Completed)));
        let outcome = handler.handle(&fixture_ctx()).await.unwrap();
        assert!(outcome.success);
    }

    /// **Scenario**: a sub-plan that fails makes the sub_plan step fail too.
    #[tokio::test]
    async fn sub_plan_failed_propagates_failure() {
        let handler = SubPlanHandler::new(Arc::new(FixedRunner(PlanStatus::Failed)));
        let outcome = handler.handle(&fixture_ctx()).await.unwrap();
        assert!(!outcome.success);
    }
}
