//! Crate-wide execution error type.
//!
//! Most components define their own narrow error enum (`PlanError`,
//! `ToolSourceError`, `StoreError`, ...); `GatewayError` is the catch-all used
//! at the seams where those narrower errors need to cross into generic code
//! (e.g. a step handler wrapping a tool failure, an LLM call failing inside
//! `llm_decision`).

use thiserror::Error;

/// Generic execution error for components that don't warrant their own enum.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Execution failed with a message (LLM call failed, tool error, ...).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The named entity (plan, step, tool, agent, workspace, ...) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not valid from the current state (e.g. resume on a
    /// plan that isn't paused).
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::ExecutionFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display format of ExecutionFailed contains the message.
    #[test]
    fn execution_failed_display_contains_message() {
        let err = GatewayError::ExecutionFailed("boom".to_string());
        assert!(err.to_string().contains("boom"));
    }

    /// **Scenario**: NotFound and IllegalState carry their message through Display.
    #[test]
    fn not_found_and_illegal_state_display() {
        assert!(GatewayError::NotFound("plan-1".into())
            .to_string()
            .contains("plan-1"));
        assert!(GatewayError::IllegalState("resume non-paused".into())
            .to_string()
            .contains("resume non-paused"));
    }
}
