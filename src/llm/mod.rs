//! LLM client boundary used by the `llm_decision` step handler and the
//! streaming chat orchestrator.
//!
//! The real provider SDKs are explicitly out of scope (spec.md §1): this
//! module only carries the trait boundary and a mock, the same split the
//! teacher crate makes between `LlmClient` (trait, in-crate) and
//! `ChatOpenAI` (real provider, not carried here).

mod mock;

pub use mock::MockLlm;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::message::Message;
use crate::tool_source::ToolSpec;

/// Tool choice mode for chat completions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    /// Model can pick between message or tool calls. Default when tools are present.
    #[default]
    Auto,
    /// Model will not call any tool.
    None,
    /// Model must call one or more tools.
    Required,
}

/// Token usage for one LLM call.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single tool call requested by the model.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One token delta emitted while streaming a completion.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// Response from an LLM completion.
#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns assistant text and optional tool calls.
///
/// Implementations: [`MockLlm`] (fixed response, used in tests and by the
/// default `llm_decision` handler configuration). A real provider
/// implementation lives outside this crate.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages and the tool schemas currently offered
    /// to the model (the four meta-tool schemas, when the caller is the chat
    /// orchestrator), return assistant content and optional tool_calls.
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmResponse, GatewayError>;

    /// Streaming variant. Default implementation calls `invoke` and sends the
    /// full content as a single chunk when a sender is provided.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, GatewayError> {
        let response = self.invoke(messages, tools).await?;
        if let Some(tx) = chunk_tx {
            let _ = tx
                .send(MessageChunk {
                    content: response.content.clone(),
                })
                .await;
        }
        Ok(response)
    }
}
