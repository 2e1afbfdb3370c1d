//! Integration coverage for the Approval Gate wired into a real chat turn
//! (spec.md §4.E / §8): a `prompt` capability blocks `ChatOrchestrator::run_turn`
//! mid-turn, and only an external `resolve_approval` call — keyed by the
//! `approval_id` the turn itself streamed out — unblocks it. This crosses the
//! module boundary the orchestrator's own unit tests don't: those only ever
//! exercise `Allowed`/`Denied` policies, never a live `Prompt` rendezvous.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use gateway_core::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use gateway_core::tools::Tool;
use gateway_core::{
    ApprovalDecision, ApprovalGate, AutonomyMode, CapabilityPolicy, ChatOrchestrator,
    ChatStreamEvent, ChatStreamWriter, LlmToolCallRequest, Message, MockLlm, ToolRegistry,
    TurnRequest, UserPolicy,
};

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "echo",
            "Echoes input",
            json!({ "type": "object", "properties": { "text": { "type": "string" } }, "required": ["text"] }),
        )
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(ToolCallContent::text(text.to_string()))
    }
}

fn request() -> TurnRequest {
    TurnRequest {
        conversation_id: "c1".to_string(),
        user_id: "u1".to_string(),
        content: "please echo".to_string(),
        history: Vec::<Message>::new(),
        max_context_tokens: 4000,
    }
}

/// **Scenario**: a `Prompt` capability pauses the turn until an external
/// `resolve_approval(Approved, ..)` call, captured from the streamed
/// `approval` event, lets the tool call run to completion.
#[tokio::test]
async fn prompt_capability_approved_externally_lets_tool_run() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(Echo), "core", false).unwrap();

    let approval = Arc::new(ApprovalGate::new().with_default_timeout(Duration::from_secs(5)));
    approval.set_policy(
        "u1",
        UserPolicy::new(AutonomyMode::Remote).with_capability("echo", CapabilityPolicy::Prompt),
    );

    let llm = Arc::new(MockLlm::new("done").with_tool_calls(vec![LlmToolCallRequest {
        id: "call-1".to_string(),
        name: "use_tool".to_string(),
        arguments: json!({ "tool_name": "echo", "arguments": { "text": "hi" } }),
    }]));

    let orchestrator = Arc::new(ChatOrchestrator::new(registry, approval.clone(), llm));
    let (tx, mut rx) = mpsc::channel(32);
    let writer = ChatStreamWriter::new(tx);

    let turn_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_turn(request(), writer).await })
    };

    let mut approval_id = None;
    while let Some(event) = rx.recv().await {
        if let ChatStreamEvent::Approval { approval_id: id, .. } = event {
            approval_id = Some(id);
            break;
        }
    }
    let approval_id = approval_id.expect("turn should have streamed an approval request");
    assert!(approval.resolve_approval(&approval_id, ApprovalDecision::Approved, None));

    let mut saw_tool_end_success = false;
    while let Some(event) = rx.recv().await {
        if let ChatStreamEvent::Progress(gateway_core::ProgressKind::ToolEnd { success, .. }) = event {
            saw_tool_end_success = success;
        }
    }
    assert!(saw_tool_end_success);

    let outcome = turn_task.await.unwrap();
    assert!(outcome.error.is_none());
}

/// **Scenario**: the same `Prompt` rendezvous, but resolved as rejected:
/// the turn completes with an `autonomy` event and no tool execution.
#[tokio::test]
async fn prompt_capability_rejected_externally_blocks_tool() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(Echo), "core", false).unwrap();

    let approval = Arc::new(ApprovalGate::new().with_default_timeout(Duration::from_secs(5)));
    approval.set_policy(
        "u1",
        UserPolicy::new(AutonomyMode::Remote).with_capability("echo", CapabilityPolicy::Prompt),
    );

    let llm = Arc::new(MockLlm::new("done").with_tool_calls(vec![LlmToolCallRequest {
        id: "call-1".to_string(),
        name: "use_tool".to_string(),
        arguments: json!({ "tool_name": "echo", "arguments": { "text": "hi" } }),
    }]));

    let orchestrator = Arc::new(ChatOrchestrator::new(registry, approval.clone(), llm));
    let (tx, mut rx) = mpsc::channel(32);
    let writer = ChatStreamWriter::new(tx);

    let turn_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_turn(request(), writer).await })
    };

    let mut approval_id = None;
    while let Some(event) = rx.recv().await {
        if let ChatStreamEvent::Approval { approval_id: id, .. } = event {
            approval_id = Some(id);
            break;
        }
    }
    let approval_id = approval_id.expect("turn should have streamed an approval request");
    assert!(approval.resolve_approval(&approval_id, ApprovalDecision::Rejected, None));

    let mut saw_autonomy = false;
    while let Some(event) = rx.recv().await {
        if let ChatStreamEvent::Autonomy { tool_name, .. } = event {
            saw_autonomy = tool_name == "echo";
        }
    }
    assert!(saw_autonomy);

    let outcome = turn_task.await.unwrap();
    assert!(outcome.error.is_none());
}
