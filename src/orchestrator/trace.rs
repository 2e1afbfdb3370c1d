//! Wire-payload conventions for one chat turn (spec.md §6): embedded
//! suggestion/memory-hint blocks, and `use_tool`/`batch_use_tool` display
//! normalisation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::llm::ToolCallRequest;
use crate::stream::{MemoryHint, Suggestion};

const MAX_SUGGESTIONS: usize = 5;
const MAX_TITLE_LEN: usize = 40;
const MAX_DETAIL_LEN: usize = 200;

static SUGGESTIONS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<suggestions>(.*?)</suggestions>\s*$").unwrap());
static MEMORY_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<memory>(.*?)</memory>\s*$").unwrap());

/// Strips a trailing `<suggestions>[...]</suggestions>` block and parses it.
/// Malformed JSON is treated as "no suggestions" rather than an error -
/// a model that botches the format shouldn't fail the whole turn.
pub fn extract_suggestions(content: &str) -> (String, Vec<Suggestion>) {
    let Some(caps) = SUGGESTIONS_BLOCK.captures(content) else {
        return (content.to_string(), Vec::new());
    };
    let stripped = SUGGESTIONS_BLOCK.replace(content, "").trim_end().to_string();
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    #[derive(serde::Deserialize)]
    struct RawSuggestion {
        title: String,
        detail: String,
    }

    let parsed: Vec<RawSuggestion> = serde_json::from_str(raw).unwrap_or_default();
    let suggestions = parsed
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|s| Suggestion {
            title: truncate_chars(&s.title, MAX_TITLE_LEN),
            detail: truncate_chars(&s.detail, MAX_DETAIL_LEN),
        })
        .collect();

    (stripped, suggestions)
}

/// Strips a trailing `<memory>[...]</memory>` block and parses it. Never
/// persisted automatically - the caller surfaces these in `done.memories`
/// and the user confirms through a suggestion.
pub fn extract_memory_hints(content: &str) -> (String, Vec<MemoryHint>) {
    let Some(caps) = MEMORY_BLOCK.captures(content) else {
        return (content.to_string(), Vec::new());
    };
    let stripped = MEMORY_BLOCK.replace(content, "").trim_end().to_string();
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    #[derive(serde::Deserialize)]
    struct RawHint {
        #[serde(rename = "type")]
        memory_type: String,
        content: String,
        importance: f32,
    }

    let parsed: Vec<RawHint> = serde_json::from_str(raw).unwrap_or_default();
    let hints = parsed
        .into_iter()
        .map(|h| MemoryHint {
            memory_type: h.memory_type,
            content: h.content,
            importance: h.importance,
        })
        .collect();

    (stripped, hints)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// The name/arguments the user should actually see for a tool call.
///
/// `use_tool` wraps the real call (`tool_name`/`arguments` fields); unwrap it
/// so traces show the inner tool, not the meta-tool. `batch_use_tool` is left
/// as-is - a batch doesn't have one inner tool to surface.
pub fn display_tool_call(call: &ToolCallRequest) -> (String, serde_json::Value) {
    if call.name == "use_tool" {
        let inner_name = call
            .arguments
            .get("tool_name")
            .and_then(|v| v.as_str())
            .unwrap_or(&call.name)
            .to_string();
        let inner_args = call.arguments.get("arguments").cloned().unwrap_or(serde_json::json!({}));
        (inner_name, inner_args)
    } else {
        (call.name.clone(), call.arguments.clone())
    }
}

/// Truncates a tool result preview to the 500-character limit spec.md names
/// for `tool_end` events.
pub fn truncate_preview(text: &str) -> String {
    const MAX: usize = 500;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let mut preview: String = text.chars().take(MAX).collect();
        preview.push('\u{2026}');
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: a well-formed suggestions block is stripped and parsed.
    #[test]
    fn extracts_well_formed_suggestions() {
        let content = "Here's my answer.\n<suggestions>[{\"title\":\"Save note\",\"detail\":\"Remember this\"}]</suggestions>";
        let (stripped, suggestions) = extract_suggestions(content);
        assert_eq!(stripped, "Here's my answer.");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Save note");
    }

    /// **Scenario**: content without a suggestions block is left untouched.
    #[test]
    fn no_suggestions_block_leaves_content_untouched() {
        let (stripped, suggestions) = extract_suggestions("plain answer");
        assert_eq!(stripped, "plain answer");
        assert!(suggestions.is_empty());
    }

    /// **Scenario**: more than five suggestions are truncated to five.
    #[test]
    fn suggestions_truncated_to_five() {
        let items: Vec<String> = (0..8)
            .map(|i| format!("{{\"title\":\"t{}\",\"detail\":\"d{}\"}}", i, i))
            .collect();
        let content = format!("text<suggestions>[{}]</suggestions>", items.join(","));
        let (_, suggestions) = extract_suggestions(&content);
        assert_eq!(suggestions.len(), 5);
    }

    /// **Scenario**: a memory hint block is stripped and parsed.
    #[test]
    fn extracts_memory_hints() {
        let content = "answer<memory>[{\"type\":\"fact\",\"content\":\"likes tea\",\"importance\":0.8}]</memory>";
        let (stripped, hints) = extract_memory_hints(content);
        assert_eq!(stripped, "answer");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].memory_type, "fact");
    }

    /// **Scenario**: a `use_tool` call is unwrapped for display.
    #[test]
    fn use_tool_call_is_unwrapped_for_display() {
        let call = ToolCallRequest {
            id: "c1".to_string(),
            name: "use_tool".to_string(),
            arguments: serde_json::json!({ "tool_name": "send_email", "arguments": { "to": "a@b.com" } }),
        };
        let (name, args) = display_tool_call(&call);
        assert_eq!(name, "send_email");
        assert_eq!(args["to"], "a@b.com");
    }

    /// **Scenario**: a `batch_use_tool` call is left as-is.
    #[test]
    fn batch_use_tool_call_is_not_unwrapped() {
        let call = ToolCallRequest {
            id: "c1".to_string(),
            name: "batch_use_tool".to_string(),
            arguments: serde_json::json!({ "calls": [] }),
        };
        let (name, _) = display_tool_call(&call);
        assert_eq!(name, "batch_use_tool");
    }

    /// **Scenario**: a long result is truncated to the 500-character preview limit.
    #[test]
    fn preview_truncates_long_results() {
        let long = "x".repeat(600);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), 501);
    }
}
