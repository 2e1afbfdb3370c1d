//! Streaming types for one chat turn.
//!
//! Defines the server-sent-event vocabulary the Streaming Chat Orchestrator
//! emits (spec.md §4.D) plus a lightweight writer tools can use to emit custom
//! progress events mid-call. The actual SSE byte encoding (the `event:`/`data:`
//! framing) is owned by the external HTTP layer; this crate hands out typed
//! [`ChatStreamEvent`] values over an `mpsc` channel.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::llm::LlmUsage;

/// A writer for emitting custom streaming events from tools.
///
/// Type-erased (no state-type parameter) so ordinary [`Tool`](crate::tools::Tool)
/// implementations, which know nothing about the orchestrator's turn state,
/// can still push progress updates.
#[derive(Clone)]
pub struct ToolStreamWriter {
    emit_fn: Arc<dyn Fn(serde_json::Value) -> bool + Send + Sync>,
}

impl ToolStreamWriter {
    pub fn new(emit_fn: impl Fn(serde_json::Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            emit_fn: Arc::new(emit_fn),
        }
    }

    /// A writer that does nothing and always reports failure to send.
    pub fn noop() -> Self {
        Self {
            emit_fn: Arc::new(|_| false),
        }
    }

    /// Emits a custom JSON payload as a `progress` event. Returns whether it was sent.
    pub fn emit_custom(&self, value: serde_json::Value) -> bool {
        (self.emit_fn)(value)
    }
}

impl Debug for ToolStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStreamWriter").finish()
    }
}

impl Default for ToolStreamWriter {
    fn default() -> Self {
        Self::noop()
    }
}

/// One entry in the `done` event's tool-call trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolTraceEntry {
    pub name: String,
    pub arguments: serde_json::Value,
    pub success: bool,
    pub result: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Full trace payload attached to the `done` event.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TurnTrace {
    pub duration_ms: u64,
    pub tool_calls: Vec<ToolTraceEntry>,
    pub model_calls: Vec<LlmUsage>,
}

/// A suggestion surfaced at the end of a turn (spec.md §6 wire conventions).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub detail: String,
}

/// A memory-save hint surfaced at the end of a turn, never auto-persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryHint {
    pub memory_type: String,
    pub content: String,
    pub importance: f32,
}

/// Session/context accounting surfaced in the `done` event.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SessionInfo {
    pub message_count: usize,
    pub estimated_tokens: u64,
    pub max_context_tokens: u64,
    pub context_fill_percent: f32,
    pub cached_tokens: Option<u64>,
}

/// Progress sub-type for the `progress` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    Status { message: String, data: Option<serde_json::Value> },
    ToolStart { name: String, arguments: serde_json::Value },
    ToolEnd { name: String, success: bool },
}

/// One event emitted while running a chat turn (spec.md §4.D).
///
/// Clients can rely on the sequence `chunk* (progress | autonomy | approval)*
/// done | error` (spec.md §8).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Token delta (or assembling tool-call fragment).
    Chunk {
        id: String,
        conversation_id: String,
        delta: Option<String>,
        done: bool,
        usage: Option<LlmUsage>,
        finish_reason: Option<String>,
    },
    /// Tool lifecycle and freeform status updates.
    Progress(ProgressKind),
    /// A tool call was rejected by the approval gate.
    Autonomy { tool_name: String, arguments: serde_json::Value, reason: String },
    /// A tool needs user consent before it can run.
    Approval {
        approval_id: String,
        category: String,
        description: String,
    },
    /// Final chunk of the turn.
    Done {
        id: String,
        finish_reason: String,
        usage: Option<LlmUsage>,
        suggestions: Vec<Suggestion>,
        memories: Vec<MemoryHint>,
        trace: TurnTrace,
        session: SessionInfo,
    },
    /// Fatal turn failure.
    Error { message: String },
}

/// Sender half of a chat turn's event channel. All writes are best-effort: a
/// client may have disconnected, and a failed `send` must never propagate into
/// execution logic (spec.md §9 "SSE back-pressure and disconnect").
#[derive(Clone)]
pub struct ChatStreamWriter {
    tx: mpsc::Sender<ChatStreamEvent>,
}

impl ChatStreamWriter {
    pub fn new(tx: mpsc::Sender<ChatStreamEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event, swallowing send failures (closed/disconnected receiver).
    pub async fn emit(&self, event: ChatStreamEvent) {
        let _ = self.tx.send(event).await;
    }

    /// Builds a [`ToolStreamWriter`] that forwards custom progress payloads
    /// through this channel as `Progress::Status` events.
    pub fn tool_writer(&self) -> ToolStreamWriter {
        let tx = self.tx.clone();
        ToolStreamWriter::new(move |value| {
            tx.try_send(ChatStreamEvent::Progress(ProgressKind::Status {
                message: "tool_progress".to_string(),
                data: Some(value),
            }))
            .is_ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: a noop ToolStreamWriter reports failure without panicking.
    #[test]
    fn noop_writer_reports_not_sent() {
        let w = ToolStreamWriter::noop();
        assert!(!w.emit_custom(serde_json::json!({"x": 1})));
    }

    /// **Scenario**: emit on a writer with a dropped receiver is swallowed, not a panic.
    #[tokio::test]
    async fn emit_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let writer = ChatStreamWriter::new(tx);
        writer
            .emit(ChatStreamEvent::Error {
                message: "x".to_string(),
            })
            .await;
    }
}
