//! Pre-tool policy check plus the out-of-band decision rendezvous
//! (spec.md §4.E).

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use crate::approval::model::{
    ApprovalDecision, ApprovalResult, CapabilityPolicy, ToolCallRequest, UserPolicy,
};
use crate::stream::{ChatStreamEvent, ChatStreamWriter};

const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(120);

struct PendingApproval {
    sender: oneshot::Sender<ApprovalDecision>,
    user_id: String,
    action_type: String,
}

/// Sits between the agent and every tool call. One instance is shared across
/// the process; per-user policy and in-flight approvals are both
/// concurrent-map state so reads and resolutions never contend.
pub struct ApprovalGate {
    policies: DashMap<String, UserPolicy>,
    pending: DashMap<String, PendingApproval>,
    /// `(userId, actionType) -> remembered until`.
    remembered: DashMap<(String, String), Instant>,
    default_timeout: Duration,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            policies: DashMap::new(),
            pending: DashMap::new(),
            remembered: DashMap::new(),
            default_timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn set_policy(&self, user_id: impl Into<String>, policy: UserPolicy) {
        self.policies.insert(user_id.into(), policy);
    }

    /// Checks whether `tool_call` may proceed for `user_id`. When the policy
    /// says `prompt`, emits an `approval` event on `stream` (if given) and
    /// awaits the decision, defaulting to deny on timeout.
    pub async fn check_tool_call_approval(
        &self,
        user_id: &str,
        tool_call: &ToolCallRequest,
        stream: Option<&ChatStreamWriter>,
    ) -> ApprovalResult {
        if self.is_remembered(user_id, &tool_call.tool_name) {
            return ApprovalResult::approved();
        }

        let policy = self
            .policies
            .get(user_id)
            .map(|p| p.clone_policy())
            .unwrap_or_default();

        match policy.policy_for(&tool_call.tool_name) {
            CapabilityPolicy::Allowed => ApprovalResult::approved(),
            CapabilityPolicy::Denied => ApprovalResult::rejected("denied by autonomy policy"),
            CapabilityPolicy::Prompt => self.prompt_and_await(user_id, tool_call, stream).await,
        }
    }

    async fn prompt_and_await(
        &self,
        user_id: &str,
        tool_call: &ToolCallRequest,
        stream: Option<&ChatStreamWriter>,
    ) -> ApprovalResult {
        let approval_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            approval_id.clone(),
            PendingApproval {
                sender: tx,
                user_id: user_id.to_string(),
                action_type: tool_call.tool_name.clone(),
            },
        );

        if let Some(stream) = stream {
            stream
                .emit(ChatStreamEvent::Approval {
                    approval_id: approval_id.clone(),
                    category: "tool_call".to_string(),
                    description: format!("Run tool '{}'?", tool_call.tool_name),
                })
                .await;
        }

        match tokio::time::timeout(self.default_timeout, rx).await {
            Ok(Ok(ApprovalDecision::Approved)) => ApprovalResult::approved(),
            Ok(Ok(ApprovalDecision::Rejected)) => ApprovalResult::rejected("rejected by user"),
            Ok(Err(_)) => ApprovalResult::rejected("approval channel closed"),
            Err(_) => {
                self.pending.remove(&approval_id);
                ApprovalResult::rejected("approval request timed out")
            }
        }
    }

    /// Resolves a pending approval (the companion `POST /approvals/{approvalId}`
    /// endpoint's handler). Returns `false` if no such approval is pending.
    /// Rejections are never remembered regardless of `remember_for`.
    pub fn resolve_approval(
        &self,
        approval_id: &str,
        decision: ApprovalDecision,
        remember_for: Option<Duration>,
    ) -> bool {
        let Some((_, pending)) = self.pending.remove(approval_id) else {
            return false;
        };

        if decision == ApprovalDecision::Approved {
            if let Some(ttl) = remember_for {
                self.remembered.insert(
                    (pending.user_id.clone(), pending.action_type.clone()),
                    Instant::now() + ttl,
                );
            }
        }

        let _ = pending.sender.send(decision);
        true
    }

    fn is_remembered(&self, user_id: &str, action_type: &str) -> bool {
        let key = (user_id.to_string(), action_type.to_string());
        match self.remembered.get(&key) {
            Some(until) if Instant::now() < *until => true,
            Some(_) => {
                self.remembered.remove(&key);
                false
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl UserPolicy {
    /// Cheap clone helper so the gate can pull a policy out of the DashMap
    /// without holding the shard lock across an `.await`.
    fn clone_policy(&self) -> UserPolicy {
        UserPolicy {
            mode: self.mode,
            capabilities: self.capabilities.clone(),
        }
    }
}
