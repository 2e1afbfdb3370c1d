//! Workspace runtime errors.

use thiserror::Error;

/// Errors raised by the workspace runtime and its manager.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace not found: {0}")]
    NotFound(String),
    #[error("turn failed: {0}")]
    TurnFailed(String),
    #[error("channel adapter send failed: {0}")]
    AdapterSend(String),
}
