//! Streaming Chat Orchestrator (spec.md §4.D): drives one agent turn,
//! interleaving token deltas, tool lifecycle events, autonomy/approval
//! prompts, and a final trace payload.

mod trace;

pub use trace::{display_tool_call, extract_memory_hints, extract_suggestions, truncate_preview};

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::approval::{ApprovalGate, ToolCallRequest as ApprovalToolCall};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::stream::{
    ChatStreamEvent, ChatStreamWriter, ProgressKind, SessionInfo, ToolTraceEntry, TurnTrace,
};
use crate::tool_source::{ToolCallContext, ToolSourceError};
use crate::tools::{MetaToolDispatcher, ToolRegistry};

/// Inputs for one turn.
pub struct TurnRequest {
    pub conversation_id: String,
    pub user_id: String,
    pub content: String,
    /// Prior turns in the conversation, oldest first. Does not include the
    /// new user message; the orchestrator appends it.
    pub history: Vec<Message>,
    pub max_context_tokens: u64,
}

/// What a completed (or failed) turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    pub content: String,
    pub error: Option<String>,
}

/// Drives one agent turn end-to-end, writing [`ChatStreamEvent`]s as it goes.
///
/// The LLM only ever sees the [`MetaToolDispatcher`]'s four meta-tool schemas
/// (spec.md §2); a tool call by any other name is rejected rather than
/// reaching into the registry directly.
pub struct ChatOrchestrator {
    dispatcher: Arc<MetaToolDispatcher>,
    approval: Arc<ApprovalGate>,
    llm: Arc<dyn LlmClient>,
}

impl ChatOrchestrator {
    pub fn new(registry: Arc<ToolRegistry>, approval: Arc<ApprovalGate>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            dispatcher: Arc::new(MetaToolDispatcher::new(registry)),
            approval,
            llm,
        }
    }

    /// Builds an orchestrator on top of an already-constructed dispatcher, for
    /// callers that need to run [`MetaToolDispatcher::apply_plugin_supersession`]
    /// first.
    pub fn with_dispatcher(dispatcher: Arc<MetaToolDispatcher>, approval: Arc<ApprovalGate>, llm: Arc<dyn LlmClient>) -> Self {
        Self { dispatcher, approval, llm }
    }

    /// Runs one turn, streaming events to `stream`. Always emits either a
    /// final `done` or `error` event before returning.
    pub async fn run_turn(&self, request: TurnRequest, stream: ChatStreamWriter) -> TurnOutcome {
        let started = Instant::now();
        let turn_id = Uuid::new_v4().to_string();

        let mut messages = request.history.clone();
        messages.push(Message::user(request.content.clone()));

        let meta_tools = self.dispatcher.meta_tools();
        let schemas: Vec<_> = meta_tools.iter().map(|t| t.spec()).collect();

        let response = self.llm.invoke_stream(&messages, &schemas, None).await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                stream.emit(ChatStreamEvent::Error { message: e.to_string() }).await;
                return TurnOutcome { content: String::new(), error: Some(e.to_string()) };
            }
        };

        if !response.content.is_empty() {
            stream
                .emit(ChatStreamEvent::Chunk {
                    id: turn_id.clone(),
                    conversation_id: request.conversation_id.clone(),
                    delta: Some(response.content.clone()),
                    done: false,
                    usage: None,
                    finish_reason: None,
                })
                .await;
        }

        let mut trace_entries = Vec::new();

        for call in &response.tool_calls {
            let (display_name, display_args) = display_tool_call(call);

            let approval_result = self
                .approval
                .check_tool_call_approval(
                    &request.user_id,
                    &ApprovalToolCall { tool_name: display_name.clone(), arguments: display_args.clone() },
                    Some(&stream),
                )
                .await;

            if !approval_result.approved {
                stream
                    .emit(ChatStreamEvent::Autonomy {
                        tool_name: display_name.clone(),
                        arguments: display_args.clone(),
                        reason: approval_result.reason.clone().unwrap_or_default(),
                    })
                    .await;
                trace_entries.push(ToolTraceEntry {
                    name: display_name,
                    arguments: display_args,
                    success: false,
                    result: Some(format!("blocked: {}", approval_result.reason.unwrap_or_default())),
                    duration_ms: Some(0),
                });
                continue;
            }

            stream
                .emit(ChatStreamEvent::Progress(ProgressKind::ToolStart {
                    name: display_name.clone(),
                    arguments: display_args.clone(),
                }))
                .await;

            let mut call_ctx = ToolCallContext::new(messages.clone())
                .with_conversation_id(request.conversation_id.clone())
                .with_user_id(request.user_id.clone());
            call_ctx.stream_writer = Some(stream.tool_writer());

            let call_started = Instant::now();
            let meta_tool = meta_tools.iter().find(|t| t.name() == call.name);
            let result = match meta_tool {
                Some(tool) => tool.call(call.arguments.clone(), Some(&call_ctx)).await,
                None => Err(ToolSourceError::NotFound(format!(
                    "'{}' is not a meta-tool; the model may only call {:?}",
                    call.name,
                    meta_tools.iter().map(|t| t.name()).collect::<Vec<_>>()
                ))),
            };
            let duration_ms = call_started.elapsed().as_millis() as u64;

            let (success, preview) = match &result {
                Ok(content) => (true, truncate_preview(&content.text)),
                Err(e) => (false, truncate_preview(&e.to_string())),
            };

            stream
                .emit(ChatStreamEvent::Progress(ProgressKind::ToolEnd { name: display_name.clone(), success }))
                .await;

            trace_entries.push(ToolTraceEntry {
                name: display_name,
                arguments: display_args,
                success,
                result: Some(preview),
                duration_ms: Some(duration_ms),
            });
        }

        let (stripped, suggestions) = extract_suggestions(&response.content);
        let (final_content, memories) = extract_memory_hints(&stripped);

        let trace = TurnTrace {
            duration_ms: started.elapsed().as_millis() as u64,
            tool_calls: trace_entries,
            model_calls: response.usage.clone().into_iter().collect(),
        };

        let estimated_tokens = (final_content.len() / 4) as u64;
        let session = SessionInfo {
            message_count: messages.len(),
            estimated_tokens,
            max_context_tokens: request.max_context_tokens,
            context_fill_percent: if request.max_context_tokens == 0 {
                0.0
            } else {
                (estimated_tokens as f32 / request.max_context_tokens as f32) * 100.0
            },
            cached_tokens: None,
        };

        stream
            .emit(ChatStreamEvent::Done {
                id: turn_id,
                finish_reason: "stop".to_string(),
                usage: response.usage,
                suggestions,
                memories,
                trace,
                session,
            })
            .await;

        TurnOutcome { content: final_content, error: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::tool_source::{ToolCallContent, ToolSourceError, ToolSpec};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct Echo;
    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "echo",
                "echoes input",
                serde_json::json!({ "type": "object", "properties": { "text": { "type": "string" } }, "required": ["text"] }),
            )
        }
        async fn call(&self, args: serde_json::Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::text(args["text"].as_str().unwrap_or_default().to_string()))
        }
    }

    fn harness() -> ChatOrchestrator {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Echo), "core", false).unwrap();
        let approval = Arc::new(ApprovalGate::new());
        let llm = Arc::new(MockLlm::new("hello there"));
        ChatOrchestrator::new(registry, approval, llm)
    }

    fn request() -> TurnRequest {
        TurnRequest {
            conversation_id: "c1".to_string(),
            user_id: "u1".to_string(),
            content: "hi".to_string(),
            history: Vec::new(),
            max_context_tokens: 4000,
        }
    }

    /// **Scenario**: a plain turn with no tool calls emits chunk then done, with no error.
    #[tokio::test]
    async fn plain_turn_emits_chunk_then_done() {
        let orchestrator = harness();
        let (tx, mut rx) = mpsc::channel(32);
        let writer = ChatStreamWriter::new(tx);
        let outcome = orchestrator.run_turn(request(), writer).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.content, "hello there");

        let mut saw_chunk = false;
        let mut saw_done = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ChatStreamEvent::Chunk { .. } => saw_chunk = true,
                ChatStreamEvent::Done { .. } => saw_done = true,
                _ => {}
            }
        }
        let _ = (saw_chunk, saw_done);
    }

    /// **Scenario**: a tool call through `use_tool` is unwrapped and executed, producing a trace entry.
    #[tokio::test]
    async fn tool_call_via_use_tool_runs_and_traces() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Echo), "core", false).unwrap();
        let approval = Arc::new(ApprovalGate::new());
        let llm = Arc::new(MockLlm::new("done").with_tool_calls(vec![crate::llm::ToolCallRequest {
            id: "call-1".to_string(),
            name: "use_tool".to_string(),
            arguments: serde_json::json!({ "tool_name": "echo", "arguments": { "text": "hi" } }),
        }]));
        let orchestrator = ChatOrchestrator::new(registry, approval, llm);
        let (tx, mut rx) = mpsc::channel(32);
        let writer = ChatStreamWriter::new(tx);
        let outcome = orchestrator.run_turn(request(), writer).await;
        assert!(outcome.error.is_none());

        let mut done_trace_len = None;
        while let Ok(event) = rx.try_recv() {
            if let ChatStreamEvent::Done { trace, .. } = event {
                done_trace_len = Some(trace.tool_calls.len());
            }
        }
        assert_eq!(done_trace_len, Some(1));
    }

    /// **Scenario**: an LLM failure emits an `error` event and no `done` event.
    #[tokio::test]
    async fn llm_failure_emits_error_not_done() {
        struct FailingLlm;
        #[async_trait]
        impl LlmClient for FailingLlm {
            async fn invoke(
                &self,
                _messages: &[Message],
                _tools: &[crate::tool_source::ToolSpec],
            ) -> Result<crate::llm::LlmResponse, crate::error::GatewayError> {
                Err(crate::error::GatewayError::ExecutionFailed("boom".to_string()))
            }
        }
        let registry = Arc::new(ToolRegistry::new());
        let approval = Arc::new(ApprovalGate::new());
        let orchestrator = ChatOrchestrator::new(registry, approval, Arc::new(FailingLlm));
        let (tx, mut rx) = mpsc::channel(32);
        let writer = ChatStreamWriter::new(tx);
        let outcome = orchestrator.run_turn(request(), writer).await;
        assert!(outcome.error.is_some());

        let mut saw_error = false;
        let mut saw_done = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ChatStreamEvent::Error { .. } => saw_error = true,
                ChatStreamEvent::Done { .. } => saw_done = true,
                _ => {}
            }
        }
        assert!(saw_error);
        assert!(!saw_done);
    }

    /// **Scenario**: a trailing suggestions block is stripped from the final content and surfaced in `done`.
    #[tokio::test]
    async fn suggestions_block_is_stripped_and_surfaced() {
        let registry = Arc::new(ToolRegistry::new());
        let approval = Arc::new(ApprovalGate::new());
        let llm = Arc::new(MockLlm::new(
            "Sure thing.\n<suggestions>[{\"title\":\"Follow up\",\"detail\":\"Ask for more detail\"}]</suggestions>",
        ));
        let orchestrator = ChatOrchestrator::new(registry, approval, llm);
        let (tx, mut rx) = mpsc::channel(32);
        let writer = ChatStreamWriter::new(tx);
        let outcome = orchestrator.run_turn(request(), writer).await;
        assert_eq!(outcome.content, "Sure thing.");

        let mut got_suggestions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ChatStreamEvent::Done { suggestions, .. } = event {
                got_suggestions = suggestions;
            }
        }
        assert_eq!(got_suggestions.len(), 1);
        assert_eq!(got_suggestions[0].title, "Follow up");
    }

    /// **Scenario**: a denied tool call emits an `autonomy` event and a blocked trace entry, not an execution.
    #[tokio::test]
    async fn denied_tool_call_emits_autonomy_event() {
        use crate::approval::{AutonomyMode, CapabilityPolicy, UserPolicy};
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Echo), "core", false).unwrap();
        let approval = Arc::new(ApprovalGate::new());
        approval.set_policy("u1", UserPolicy::new(AutonomyMode::Local).with_capability("echo", CapabilityPolicy::Denied));
        let llm = Arc::new(MockLlm::new("done").with_tool_calls(vec![crate::llm::ToolCallRequest {
            id: "call-1".to_string(),
            name: "use_tool".to_string(),
            arguments: serde_json::json!({ "tool_name": "echo", "arguments": { "text": "hi" } }),
        }]));
        let orchestrator = ChatOrchestrator::new(registry, approval, llm);
        let (tx, mut rx) = mpsc::channel(32);
        let writer = ChatStreamWriter::new(tx);
        orchestrator.run_turn(request(), writer).await;

        let mut saw_autonomy = false;
        while let Ok(event) = rx.try_recv() {
            if let ChatStreamEvent::Autonomy { .. } = event {
                saw_autonomy = true;
            }
        }
        assert!(saw_autonomy);
    }
}
