//! Step handler trait and the seven built-in handlers (spec.md §4.C).

mod condition;
mod llm_decision;
mod r#loop;
mod parallel;
mod sub_plan;
mod tool_call;
mod user_input;

pub use condition::ConditionHandler;
pub use llm_decision::LlmDecisionHandler;
pub use parallel::ParallelHandler;
pub use r#loop::LoopHandler;
pub use sub_plan::{SubPlanHandler, SubPlanRunner};
pub use tool_call::ToolCallHandler;
pub use user_input::UserInputHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::plan::error::PlanError;
use crate::plan::model::{Plan, Step};

/// Per-step execution context handed to a [`StepHandler`]: the owning plan,
/// the step being run, prior step results, and a cancellation signal shared
/// with the executor's `abort`.
pub struct PlanExecutionContext {
    pub plan: Plan,
    pub step: Step,
    pub previous_results: HashMap<String, serde_json::Value>,
    pub cancellation: watch::Receiver<bool>,
}

impl PlanExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        *self.cancellation.borrow()
    }
}

/// What a handler reports back to the executor.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub next_step: Option<String>,
    pub should_pause: bool,
    pub requires_approval: bool,
}

impl StepOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_next_step(mut self, step_id: impl Into<String>) -> Self {
        self.next_step = Some(step_id.into());
        self
    }

    pub fn pausing(mut self) -> Self {
        self.should_pause = true;
        self
    }

    pub fn needs_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// A pure adapter from `(config, context) -> StepOutcome`, registered under
/// the step's `type` string (`tool_call`, `llm_decision`, ...). The handler
/// table is open: plugins can register additional types alongside the seven
/// built-ins.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError>;
}

/// Registers the seven built-in handlers under their type strings.
pub fn register_builtin_handlers(
    handlers: &dashmap::DashMap<String, Arc<dyn StepHandler>>,
    tool_call: Arc<ToolCallHandler>,
    llm_decision: Arc<LlmDecisionHandler>,
    parallel: Arc<ParallelHandler>,
    loop_handler: Arc<LoopHandler>,
    sub_plan: Arc<SubPlanHandler>,
) {
    handlers.insert("tool_call".to_string(), tool_call);
    handlers.insert("llm_decision".to_string(), llm_decision);
    handlers.insert("user_input".to_string(), Arc::new(UserInputHandler));
    handlers.insert("condition".to_string(), Arc::new(ConditionHandler));
    handlers.insert("parallel".to_string(), parallel);
    handlers.insert("loop".to_string(), loop_handler);
    handlers.insert("sub_plan".to_string(), sub_plan);
}
