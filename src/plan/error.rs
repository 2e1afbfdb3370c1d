//! Errors raised while executing, scheduling, or persisting a plan.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PlanError {
    #[error("plan not found: {0}")]
    NotFound(String),

    #[error("plan already running: {0}")]
    AlreadyRunning(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("no handler registered for step type: {0}")]
    HandlerNotFound(String),

    #[error("dependency deadlock: all pending steps have unmet dependencies")]
    Deadlock,

    #[error("plan execution aborted")]
    Aborted,

    #[error("step timed out after {0}ms")]
    Timeout(u64),

    #[error("plan deleted during execution")]
    PlanDeleted,

    #[error("repository error: {0}")]
    Repository(String),
}
