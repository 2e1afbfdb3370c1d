//! Context passed into tool calls for the current step.
//!
//! Used by tools that need access to the current conversation (e.g. a
//! `get_recent_messages` style tool) or to the current workspace/thread. The
//! `tool_call` step handler builds this before invoking
//! [`ToolRegistry::execute`](crate::tools::ToolRegistry::execute) and, when
//! streaming is enabled, attaches a [`ToolStreamWriter`] so a long-running
//! tool can push progress events mid-call.
//!
//! ```rust,ignore
//! use gateway_core::tool_source::ToolCallContext;
//! use serde_json::json;
//!
//! async fn my_tool(ctx: Option<&ToolCallContext>) -> String {
//!     if let Some(ctx) = ctx {
//!         ctx.emit_custom(json!({"status": "starting"}));
//!     }
//!     "Result".to_string()
//! }
//! ```

use crate::message::Message;
use crate::stream::ToolStreamWriter;

/// Per-call context available to tools during execution.
///
/// Built by the `tool_call` step handler from the plan's current conversation
/// buffer and the owning workspace/conversation ids. Tools that don't need it
/// simply ignore the fields they don't use.
///
/// # Fields
///
/// - `recent_messages`: conversation messages available at the time this step ran.
/// - `stream_writer`: optional writer for emitting custom streaming events.
/// - `conversation_id`: the workspace/conversation this call is running for.
/// - `user_id`: optional user id, used for multi-tenant or namespaced storage.
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    /// Recent messages in the current conversation.
    pub recent_messages: Vec<Message>,

    /// Optional writer for emitting custom streaming events mid-call.
    pub stream_writer: Option<ToolStreamWriter>,

    /// Optional conversation/workspace id for the current run.
    pub conversation_id: Option<String>,

    /// Optional user id for the current run.
    pub user_id: Option<String>,
}

impl ToolCallContext {
    /// Creates a new ToolCallContext with the given messages.
    ///
    /// `stream_writer`, `conversation_id`, and `user_id` are set to `None`.
    pub fn new(recent_messages: Vec<Message>) -> Self {
        Self {
            recent_messages,
            stream_writer: None,
            conversation_id: None,
            user_id: None,
        }
    }

    /// Creates a new ToolCallContext with messages and a stream writer.
    pub fn with_stream_writer(recent_messages: Vec<Message>, stream_writer: ToolStreamWriter) -> Self {
        Self {
            recent_messages,
            stream_writer: Some(stream_writer),
            conversation_id: None,
            user_id: None,
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Emits a custom streaming event if a writer is available.
    ///
    /// Returns `true` if the event was sent, `false` if no writer is attached
    /// or sending failed.
    pub fn emit_custom(&self, value: serde_json::Value) -> bool {
        self.stream_writer
            .as_ref()
            .map(|w| w.emit_custom(value))
            .unwrap_or(false)
    }
}
