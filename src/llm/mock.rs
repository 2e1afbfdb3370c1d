//! Fixed-response LLM client for tests and default wiring.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::message::Message;
use crate::tool_source::ToolSpec;

use super::{LlmClient, LlmResponse, ToolCallRequest};

/// Returns a fixed response (and optional fixed tool calls) regardless of input.
pub struct MockLlm {
    content: String,
    tool_calls: Vec<ToolCallRequest>,
}

impl MockLlm {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message], _tools: &[ToolSpec]) -> Result<LlmResponse, GatewayError> {
        Ok(LlmResponse {
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            usage: None,
        })
    }
}
