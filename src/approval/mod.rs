//! Approval & Autonomy Gate (spec.md §4.E): pre-tool policy check, streamed
//! consent prompts, and decision caching.

mod gate;
mod model;

pub use gate::ApprovalGate;
pub use model::{
    ApprovalDecision, ApprovalRequest, ApprovalResult, ApprovalStatus, AutonomyMode,
    CapabilityPolicy, ToolCallRequest, UserPolicy,
};
