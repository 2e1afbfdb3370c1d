use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::llm::LlmClient;
use crate::message::Message;
use crate::plan::error::PlanError;

use super::{PlanExecutionContext, StepHandler, StepOutcome};

/// `llm_decision`: config `{ "prompt": string, "choices": [string]? }`.
///
/// Appends `choices` as a bulleted list and a summary of `previousResults`
/// to the prompt, then invokes the LLM client. Returns
/// `{ "decision": string, "tool_calls": [...] }` on success.
pub struct LlmDecisionHandler {
    llm: Arc<dyn LlmClient>,
}

impl LlmDecisionHandler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StepHandler for LlmDecisionHandler {
    async fn handle(&self, ctx: &PlanExecutionContext) -> Result<StepOutcome, PlanError> {
        let prompt = match ctx.step.config.get("prompt").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return Ok(StepOutcome::failure("llm_decision step requires 'prompt'")),
        };

        let mut full_prompt = prompt.to_string();

        if let Some(choices) = ctx.step.config.get("choices").and_then(|v| v.as_array()) {
            full_prompt.push_str("\n\nChoices:\n");
            for choice in choices {
                if let Some(c) = choice.as_str() {
                    full_prompt.push_str(&format!("- {}\n", c));
                }
            }
        }

        if !ctx.previous_results.is_empty() {
            full_prompt.push_str("\n\nPrevious results:\n");
            let mut keys: Vec<&String> = ctx.previous_results.keys().collect();
            keys.sort();
            for key in keys {
                full_prompt.push_str(&format!("- {}: {}\n", key, ctx.previous_results[key]));
            }
        }

        let messages = vec![Message::user(full_prompt)];
        match self.llm.invoke(&messages, &[]).await {
            Ok(response) => Ok(StepOutcome::ok(json!({
                "decision": response.content,
                "tool_calls": response.tool_calls,
            }))),
            Err(e) => Ok(StepOutcome::failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::plan::model::{Plan, Step};
    use tokio::sync::watch;

    fn fixture_ctx(config: serde_json::Value) -> PlanExecutionContext {
        let (_tx, rx) = watch::channel(false);
        PlanExecutionContext {
            plan: Plan::new("p1", "u1", "n", "g", 1),
            step: Step::new("s1", "p1", 1, "llm_decision", "decide", config),
            previous_results: Default::default(),
            cancellation: rx,
        }
    }

    /// **Scenario**: llm_decision surfaces the mock's fixed decision content.
    #[tokio::test]
    async fn llm_decision_returns_content() {
        let handler = LlmDecisionHandler::new(Arc::new(MockLlm::new("go with plan B")));
        let ctx = fixture_ctx(json!({ "prompt": "pick a plan", "choices": ["A", "B"] }));
        let outcome = handler.handle(&ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["decision"], "go with plan B");
    }

    /// **Scenario**: llm_decision without a prompt fails cleanly.
    #[tokio::test]
    async fn llm_decision_without_prompt_fails() {
        let handler = LlmDecisionHandler::new(Arc::new(MockLlm::new("x")));
        let ctx = fixture_ctx(json!({}));
        let outcome = handler.handle(&ctx).await.unwrap();
        assert!(!outcome.success);
    }
}
