//! Types shared between the gate and the out-of-band decision endpoint
//! (spec.md §6's `POST /approvals/{approvalId}`).

use serde::{Deserialize, Serialize};

/// A tool call awaiting (or past) a policy decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// One pending (or resolved) approval request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approval_id: String,
    pub category: String,
    pub action_type: String,
    pub description: String,
    pub params: serde_json::Value,
    pub status: ApprovalStatus,
}

impl ApprovalRequest {
    pub fn new(
        approval_id: impl Into<String>,
        category: impl Into<String>,
        action_type: impl Into<String>,
        description: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            approval_id: approval_id.into(),
            category: category.into(),
            action_type: action_type.into(),
            description: description.into(),
            params,
            status: ApprovalStatus::Pending,
        }
    }
}

/// The decision delivered by the companion endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// A tool call as presented to the gate: the name the LLM invoked and the
/// arguments it supplied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Per-user, per-capability autonomy policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPolicy {
    Allowed,
    Denied,
    Prompt,
}

/// Autonomy mode: `local` trusts the caller's own policy table outright;
/// `remote` always prompts regardless of the table (a stricter default for
/// actions reaching outside the local machine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyMode {
    Local,
    Remote,
}

/// One user's autonomy policy: mode plus a per-capability allowlist.
#[derive(Clone, Debug, Default)]
pub struct UserPolicy {
    pub mode: Option<AutonomyMode>,
    pub capabilities: std::collections::HashMap<String, CapabilityPolicy>,
}

impl UserPolicy {
    pub fn new(mode: AutonomyMode) -> Self {
        Self { mode: Some(mode), capabilities: Default::default() }
    }

    pub fn with_capability(mut self, action_type: impl Into<String>, policy: CapabilityPolicy) -> Self {
        self.capabilities.insert(action_type.into(), policy);
        self
    }

    /// Defaults unknown capabilities to `prompt` under `remote`, `allowed`
    /// under `local` (or when no mode was configured at all).
    pub fn policy_for(&self, action_type: &str) -> CapabilityPolicy {
        if let Some(policy) = self.capabilities.get(action_type) {
            return *policy;
        }
        match self.mode {
            Some(AutonomyMode::Remote) => CapabilityPolicy::Prompt,
            _ => CapabilityPolicy::Allowed,
        }
    }
}

/// Result handed back to the agent/bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalResult {
    pub approved: bool,
    pub reason: Option<String>,
}

impl ApprovalResult {
    pub fn approved() -> Self {
        Self { approved: true, reason: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { approved: false, reason: Some(reason.into()) }
    }
}
