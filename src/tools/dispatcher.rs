//! The four meta-tools exposed to the LLM in place of every concrete tool
//! schema (spec.md §2/§4.A): `search_tools`, `get_tool_help`, `use_tool`,
//! `batch_use_tool`.
//!
//! Concrete tools live in the [`ToolRegistry`](super::ToolRegistry); the LLM
//! never sees their schemas directly. These four wrap the registry and are
//! the only tools ever placed in the agent's tool list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use crate::tools::fuzzy::suggest_names;
use crate::tools::{Tool, ToolRegistry};

pub const TOOL_SEARCH_TOOLS: &str = "search_tools";
pub const TOOL_GET_TOOL_HELP: &str = "get_tool_help";
pub const TOOL_USE_TOOL: &str = "use_tool";
pub const TOOL_BATCH_USE_TOOL: &str = "batch_use_tool";

/// Names of the 4 meta-tools, in the order they're built by [`MetaToolDispatcher::meta_tools`].
pub const META_TOOL_NAMES: [&str; 4] = [
    TOOL_SEARCH_TOOLS,
    TOOL_GET_TOOL_HELP,
    TOOL_USE_TOOL,
    TOOL_BATCH_USE_TOOL,
];

const MAX_ARGS_BYTES: usize = 100 * 1024;
const MAX_BATCH_CALLS: usize = 20;

/// Per-tool numeric argument caps applied silently before `call` runs
/// (spec.md §5 "Tool argument limits"), keyed by `(tool_name, param_name)`.
fn numeric_caps() -> &'static HashMap<(&'static str, &'static str), u64> {
    use once_cell::sync::Lazy;
    static CAPS: Lazy<HashMap<(&'static str, &'static str), u64>> = Lazy::new(|| {
        let mut m = HashMap::new();
        m.insert(("list_emails", "limit"), 50);
        m
    });
    &CAPS
}

fn apply_numeric_caps(tool_name: &str, mut args: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = args.as_object_mut() {
        for ((tool, param), cap) in numeric_caps() {
            if *tool != tool_name {
                continue;
            }
            if let Some(v) = obj.get(*param).and_then(|v| v.as_u64()) {
                if v > *cap {
                    obj.insert(param.to_string(), json!(*cap));
                }
            }
        }
    }
    args
}

fn missing_required_params(spec: &ToolSpec, args: &serde_json::Value) -> Vec<String> {
    spec.required_params()
        .into_iter()
        .filter(|p| args.get(p).is_none())
        .collect()
}

/// Renders one tool's markdown help block: name, description, parameter table.
fn render_tool_help(spec: &ToolSpec) -> String {
    let mut out = format!("### {}\n\n{}\n\n", spec.name, spec.description.as_deref().unwrap_or(""));
    let required = spec.required_params();
    match spec.properties() {
        Some(props) if !props.is_empty() => {
            out.push_str("| name | type | required | description | default | enum |\n");
            out.push_str("|---|---|---|---|---|---|\n");
            for (name, schema) in props {
                let ty = schema.get("type").and_then(|v| v.as_str()).unwrap_or("any");
                let req = if required.contains(name) { "yes" } else { "no" };
                let desc = schema.get("description").and_then(|v| v.as_str()).unwrap_or("");
                let default = schema
                    .get("default")
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let enum_vals = schema
                    .get("enum")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    name, ty, req, desc, default, enum_vals
                ));
            }
        }
        _ => out.push_str("_no parameters_\n"),
    }
    out
}

fn not_found_with_suggestions(name: &str, registry: &ToolRegistry) -> String {
    let names = registry.names();
    let suggestions = suggest_names(name, &names);
    let mut msg = format!("Tool '{}' not found.", name);
    if !suggestions.is_empty() {
        msg.push_str(&format!(" Did you mean: {}", suggestions.join(", ")));
    }
    msg
}

/// Looks up a tool, records the registry's current names (in query order), and
/// tokenizes a query, all helpers used by [`SearchToolsTool`].
///
/// `searchTags` (spec.md §4.A) are curated extra terms layered on top of the
/// tool's own name/description/category/tags, via [`ToolRegistry::set_search_tags`].
fn matches_query(spec: &ToolSpec, search_tags: &[String], terms: &[String], category: Option<&str>) -> bool {
    if let Some(cat) = category {
        if spec.category.as_deref() != Some(cat) {
            return false;
        }
    }
    let haystack = format!(
        "{} {} {} {} {}",
        spec.name,
        spec.description.as_deref().unwrap_or(""),
        spec.category.as_deref().unwrap_or(""),
        spec.tags.join(" "),
        search_tags.join(" "),
    )
    .to_lowercase();
    terms.iter().all(|t| haystack.contains(t))
}

pub struct SearchToolsTool {
    registry: Arc<ToolRegistry>,
}

impl SearchToolsTool {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for SearchToolsTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_TOOLS
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            TOOL_SEARCH_TOOLS,
            "Search the tool catalog by keyword. Pass query \"all\" or \"*\" to list every tool.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Whitespace-separated search terms, or \"all\"/\"*\"." },
                    "category": { "type": "string", "description": "Restrict to a tool category." },
                    "include_params": { "type": "boolean", "description": "Include full parameter documentation in results." }
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'query'".to_string()))?;
        let category = args.get("category").and_then(|v| v.as_str());
        let include_params = args.get("include_params").and_then(|v| v.as_bool()).unwrap_or(false);

        let mut specs = self.registry.list();
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        let matched: Vec<&ToolSpec> = if query.trim() == "all" || query.trim() == "*" {
            specs.iter().filter(|s| category.map_or(true, |c| s.category.as_deref() == Some(c))).collect()
        } else {
            let terms: Vec<String> = query.split_whitespace().map(|t| t.to_lowercase()).collect();
            specs
                .iter()
                .filter(|s| matches_query(s, &self.registry.search_tags(&s.name), &terms, category))
                .collect()
        };

        if matched.is_empty() {
            return Ok(ToolCallContent::text(format!("No tools matched '{}'.", query)));
        }

        let text = if include_params {
            matched.iter().map(|s| render_tool_help(s)).collect::<Vec<_>>().join("\n")
        } else if matched.len() >= 100 {
            format!(
                "{} tools matched; refine your query or pass include_params=false for a name-only list.",
                matched.len()
            )
        } else {
            matched
                .iter()
                .map(|s| format!("- **{}** — {}", s.name, s.description.as_deref().unwrap_or("")))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(ToolCallContent::text(text))
    }
}

pub struct GetToolHelpTool {
    registry: Arc<ToolRegistry>,
}

impl GetToolHelpTool {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for GetToolHelpTool {
    fn name(&self) -> &str {
        TOOL_GET_TOOL_HELP
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            TOOL_GET_TOOL_HELP,
            "Get full documentation for one or more tools by name.",
            json!({
                "type": "object",
                "properties": {
                    "tool_name": { "type": "string", "description": "Single tool name." },
                    "tool_names": { "type": "array", "items": { "type": "string" }, "description": "Multiple tool names." }
                }
            }),
        )
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let mut names: Vec<String> = Vec::new();
        if let Some(n) = args.get("tool_name").and_then(|v| v.as_str()) {
            names.push(n.to_string());
        }
        if let Some(arr) = args.get("tool_names").and_then(|v| v.as_array()) {
            names.extend(arr.iter().filter_map(|v| v.as_str().map(String::from)));
        }
        if names.is_empty() {
            return Err(ToolSourceError::InvalidInput(
                "provide 'tool_name' or 'tool_names'".to_string(),
            ));
        }

        let mut blocks = Vec::with_capacity(names.len());
        for name in &names {
            match self.registry.get_definition(name) {
                Some(spec) => blocks.push(render_tool_help(&spec)),
                None => blocks.push(format!("### {}\n\n{}\n", name, not_found_with_suggestions(name, &self.registry))),
            }
        }

        Ok(ToolCallContent::text(blocks.join("\n")))
    }
}

pub struct UseToolTool {
    registry: Arc<ToolRegistry>,
}

impl UseToolTool {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Runs one named tool call, applying the same validation `use_tool` and
    /// `batch_use_tool` share: unknown-name, required-param, size-cap, and
    /// numeric-cap checks before dispatch.
    pub async fn run_one(
        registry: &ToolRegistry,
        tool_name: &str,
        arguments: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let spec = registry
            .get_definition(tool_name)
            .ok_or_else(|| ToolSourceError::NotFound(not_found_with_suggestions(tool_name, registry)))?;

        let missing = missing_required_params(&spec, &arguments);
        if !missing.is_empty() {
            return Err(ToolSourceError::InvalidInput(format!(
                "missing required parameter(s): {}\n\n{}",
                missing.join(", "),
                render_tool_help(&spec)
            )));
        }

        let encoded = serde_json::to_vec(&arguments).map_err(|e| ToolSourceError::InvalidInput(e.to_string()))?;
        if encoded.len() > MAX_ARGS_BYTES {
            return Err(ToolSourceError::PayloadTooLarge(format!(
                "arguments are {} bytes, limit is {} bytes",
                encoded.len(),
                MAX_ARGS_BYTES
            )));
        }

        let capped_args = apply_numeric_caps(tool_name, arguments);

        let tool = registry
            .get(tool_name)
            .ok_or_else(|| ToolSourceError::NotFound(not_found_with_suggestions(tool_name, registry)))?;

        match tool.call(capped_args, ctx).await {
            Ok(content) => Ok(content),
            Err(e) => Err(ToolSourceError::Execution(format!("{}\n\n{}", e, render_tool_help(&spec)))),
        }
    }
}

#[async_trait]
impl Tool for UseToolTool {
    fn name(&self) -> &str {
        TOOL_USE_TOOL
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            TOOL_USE_TOOL,
            "Call one registered tool by name with arguments.",
            json!({
                "type": "object",
                "properties": {
                    "tool_name": { "type": "string" },
                    "arguments": { "type": "object" }
                },
                "required": ["tool_name", "arguments"]
            }),
        )
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool_name = args
            .get("tool_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'tool_name'".to_string()))?
            .to_string();
        let arguments = args.get("arguments").cloned().unwrap_or_else(|| json!({}));
        Self::run_one(&self.registry, &tool_name, arguments, ctx).await
    }
}

pub struct BatchUseToolTool {
    registry: Arc<ToolRegistry>,
}

impl BatchUseToolTool {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for BatchUseToolTool {
    fn name(&self) -> &str {
        TOOL_BATCH_USE_TOOL
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            TOOL_BATCH_USE_TOOL,
            "Run up to 20 independent tool calls concurrently and return one combined report.",
            json!({
                "type": "object",
                "properties": {
                    "calls": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "tool_name": { "type": "string" },
                                "arguments": { "type": "object" }
                            },
                            "required": ["tool_name", "arguments"]
                        },
                        "minItems": 1,
                        "maxItems": 20
                    }
                },
                "required": ["calls"]
            }),
        )
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let calls = args
            .get("calls")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing or invalid 'calls' array".to_string()))?;

        if calls.is_empty() || calls.len() > MAX_BATCH_CALLS {
            return Err(ToolSourceError::InvalidInput(format!(
                "calls must have 1–{} items, got {}",
                MAX_BATCH_CALLS,
                calls.len()
            )));
        }

        let mut handles = Vec::with_capacity(calls.len());
        for (i, call) in calls.iter().enumerate() {
            let tool_name = call
                .get("tool_name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolSourceError::InvalidInput(format!("call {}: missing 'tool_name'", i + 1)))?
                .to_string();
            let arguments = call.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let registry = Arc::clone(&self.registry);
            let ctx_owned = ctx.cloned();
            handles.push(tokio::spawn(async move {
                let ctx_ref = ctx_owned.as_ref();
                let result = UseToolTool::run_one(&registry, &tool_name, arguments, ctx_ref).await;
                (i, tool_name, result)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for h in handles {
            let r = h
                .await
                .map_err(|e| ToolSourceError::Transport(format!("batch task join failed: {}", e)))?;
            results.push(r);
        }

        let mut any_ok = false;
        let mut report = String::new();
        for (i, name, result) in results {
            match result {
                Ok(content) => {
                    any_ok = true;
                    report.push_str(&format!("### {}. {} \u{2713}\n\n{}\n\n", i + 1, name, content.text));
                }
                Err(e) => {
                    report.push_str(&format!("### {}. {} \u{2717}\n\n{}\n\n", i + 1, name, e));
                }
            }
        }

        if !any_ok {
            return Err(ToolSourceError::Execution(report));
        }

        Ok(ToolCallContent::text(report))
    }
}

/// Builds and wires the 4 meta-tools on top of a shared registry, and applies
/// plugin supersession at construction time (spec.md §2 "Plugin supersession").
pub struct MetaToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl MetaToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Removes core stub tools superseded by a plugin that registers the same
    /// logical capability, per `plugin_supersedes_core: pluginName -> [coreStubNames]`.
    /// Runs once at agent-construction time.
    pub fn apply_plugin_supersession(&self, table: &HashMap<String, Vec<String>>) {
        for (plugin, core_stubs) in table {
            if self.registry.source_of_plugin_exists(plugin) {
                self.registry.unregister_by_names(core_stubs);
            }
        }
    }

    /// The 4 meta-tool [`Tool`] implementations, in a stable order, ready to
    /// be the only entries in the agent's tool schema.
    pub fn meta_tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(SearchToolsTool::new(Arc::clone(&self.registry))),
            Arc::new(GetToolHelpTool::new(Arc::clone(&self.registry))),
            Arc::new(UseToolTool::new(Arc::clone(&self.registry))),
            Arc::new(BatchUseToolTool::new(Arc::clone(&self.registry))),
        ]
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}

impl ToolRegistry {
    /// Whether any tool currently registered carries `source == "plugin:<name>"`.
    fn source_of_plugin_exists(&self, plugin: &str) -> bool {
        let tag = format!("plugin:{}", plugin);
        self.names().iter().any(|n| self.source_of(n).as_deref() == Some(tag.as_str()))
    }
}
