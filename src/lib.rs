//! # gateway-core
//!
//! A privacy-first, self-hosted agent orchestration gateway: it accepts
//! natural-language requests, routes them through an LLM-backed agent,
//! executes tools on the user's behalf, and carries out multi-step plans that
//! combine tool invocations, LLM decisions, user inputs, and sub-plans.
//!
//! ## Design principles
//!
//! - **Two surfaces only.** The LLM ever sees four meta-tools
//!   ([`tools::SearchToolsTool`], [`tools::GetToolHelpTool`], [`tools::UseToolTool`],
//!   [`tools::BatchUseToolTool`]); every other tool is reached indirectly through them.
//! - **Durable, suspendable plans.** [`plan::PlanExecutor`] runs a DAG of steps
//!   with retries, timeouts, pause/resume, and checkpointing, against a
//!   [`plan::PlanRepository`] boundary rather than an in-process-only model.
//! - **Approval before autonomy.** Every tool call passes through
//!   [`approval::ApprovalGate`] before it runs; policy and live consent prompts
//!   share one correlation id.
//! - **One event vocabulary for streaming.** [`orchestrator::ChatOrchestrator`]
//!   emits [`stream::ChatStreamEvent`]s; encoding them as SSE bytes is left to
//!   the (out-of-scope) HTTP layer.
//!
//! ## Main modules
//!
//! - [`tools`] / [`tool_source`]: the [`tools::Tool`] trait, [`tools::ToolRegistry`],
//!   fuzzy name suggestions, and the four meta-tools.
//! - [`plan`]: [`plan::Plan`], [`plan::Step`], [`plan::PlanExecutor`], the seven
//!   built-in [`plan::StepHandler`]s, and the [`plan::PlanRepository`] boundary
//!   ([`plan::InMemoryPlanRepository`], [`plan::SqlitePlanRepository`]).
//! - [`approval`]: [`approval::ApprovalGate`], [`approval::UserPolicy`],
//!   [`approval::ApprovalDecision`].
//! - [`orchestrator`] / [`stream`]: [`orchestrator::ChatOrchestrator`],
//!   [`stream::ChatStreamEvent`], [`stream::ChatStreamWriter`].
//! - [`workspace`]: [`workspace::WorkspaceRuntime`], [`workspace::WorkspaceManager`],
//!   [`workspace::EventEmitter`].
//! - [`agent_cache`]: [`agent_cache::AgentCacheManager`], bounded-FIFO,
//!   single-flight agent construction.
//! - [`persistence`]: the `memories`/`goals`/`customTools` repository contracts.
//! - [`llm`]: [`llm::LlmClient`] trait and [`llm::MockLlm`] test double.
//! - [`message`]: [`Message`] (System / User / Assistant / Tool).
//! - [`config`]: run-configuration summaries for logging/verbose output.
//!
//! Key types are re-exported at crate root: `use gateway_core::{PlanExecutor, ToolRegistry, Message};`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway_core::{ApprovalGate, ChatOrchestrator, MockLlm, ToolRegistry};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(ToolRegistry::new());
//! let approval = Arc::new(ApprovalGate::new());
//! let llm = Arc::new(MockLlm::new("hello!"));
//! let _orchestrator = ChatOrchestrator::new(registry, approval, llm);
//! # }
//! ```

pub mod agent_cache;
pub mod approval;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod persistence;
pub mod plan;
pub mod stream;
pub mod tool_source;
pub mod tools;
pub mod workspace;

pub use agent_cache::{AgentCacheManager, FifoCache, SingleFlightCache};
pub use approval::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalResult, ApprovalStatus, AutonomyMode,
    CapabilityPolicy, ToolCallRequest as ApprovalToolCallRequest, UserPolicy,
};
pub use config::{
    build_config_summary, ConfigSection, EmbeddingConfigSummary, LlmConfigSummary,
    MemoryConfigSummary, RunConfigSummary, RunConfigSummarySource, ToolConfigSummary,
};
pub use error::GatewayError;
pub use llm::{LlmClient, LlmResponse, LlmUsage, MockLlm, ToolCallRequest as LlmToolCallRequest, ToolChoiceMode};
pub use message::Message;
pub use orchestrator::{
    display_tool_call, extract_memory_hints, extract_suggestions, truncate_preview, ChatOrchestrator,
    TurnOutcome, TurnRequest,
};
pub use persistence::{
    CustomTool, CustomToolFilter, CustomToolRepository, Goal, GoalRepository, Memory,
    MemoryRepository, PersistenceError,
};
pub use plan::{
    load_plan_with_steps, previous_results, register_builtin_handlers, ConditionHandler,
    InMemoryPlanRepository, LlmDecisionHandler, LoopHandler, OnFailure, ParallelHandler, Plan,
    PlanError, PlanEvent, PlanExecutionContext, PlanExecutor, PlanRepository, PlanResult,
    PlanStatus, SqlitePlanRepository, Step, StepHandler, StepOutcome, StepStatus, SubPlanHandler,
    SubPlanRunner, ToolCallHandler, UserInputHandler,
};
pub use stream::{
    ChatStreamEvent, ChatStreamWriter, MemoryHint, ProgressKind, SessionInfo, Suggestion,
    ToolStreamWriter, ToolTraceEntry, TurnTrace,
};
pub use tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
pub use tools::{
    BatchUseToolTool, GetToolHelpTool, MetaToolDispatcher, SearchToolsTool, Tool, ToolRegistry,
    UseToolTool,
};
pub use workspace::{
    ChannelAdapter, EventEmitter, HandlerId, WorkspaceError, WorkspaceManager, WorkspaceRuntime,
    WorkspaceSettings, WorkspaceState,
};
