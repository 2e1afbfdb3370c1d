//! Durable plan executor (spec.md §4.B/§4.C): the DAG-of-steps state machine,
//! its step handler library, and the persistence boundary it runs against.

mod error;
mod executor;
mod handlers;
mod logging;
mod model;
mod repository;

pub use error::PlanError;
pub use executor::{PlanExecutor, PlanResult};
pub use handlers::{
    register_builtin_handlers, ConditionHandler, LlmDecisionHandler, LoopHandler, ParallelHandler,
    PlanExecutionContext, StepHandler, StepOutcome, SubPlanHandler, SubPlanRunner, ToolCallHandler,
    UserInputHandler,
};
pub use model::{OnFailure, Plan, PlanEvent, PlanStatus, Step, StepStatus};
pub use repository::{load_plan_with_steps, previous_results, InMemoryPlanRepository, PlanRepository, SqlitePlanRepository};
