//! LLM config block for run config summary.
//!
//! Implements [`ConfigSection`](super::ConfigSection). Used by CLI or other callers
//! to build the "LLM config" line. Does not include api_key.

use super::ConfigSection;

/// LLM configuration summary: model, api_base, temperature, tool_choice (no api_key).
///
/// Built from RunConfig LLM fields (effective values, e.g. default model/base).
pub struct LlmConfigSummary {
    /// Model name, e.g. `claude-3-5-sonnet`.
    pub model: String,
    /// API base URL used for LLM calls.
    pub api_base: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Tool choice mode, e.g. `"auto"`, `"none"`, `"required"`.
    pub tool_choice: String,
}

impl ConfigSection for LlmConfigSummary {
    fn section_name(&self) -> &str {
        "LLM config"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.model.clone()),
            ("api_base", self.api_base.clone()),
            ("temperature", self.temperature.to_string()),
            ("tool_choice", self.tool_choice.clone()),
        ]
    }
}
