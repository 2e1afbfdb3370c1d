//! Concrete tool storage.
//!
//! Reads (`get`, `has`, `list`) are the hot path — every `search_tools` and
//! `use_tool` call goes through here — so the registry is a `DashMap` rather
//! than a `Mutex<HashMap>`.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::tool_source::ToolSpec;
use crate::tools::Tool;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// A tool held by the registry, along with the source that registered it
/// (`"core"`, `"plugin:<name>"`, `"user"`, ...), used by supersession.
pub struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    pub source: String,
}

/// Registry of concrete tools, keyed by name.
///
/// Never exposed to the LLM directly; the [`MetaToolDispatcher`](super::MetaToolDispatcher)
/// is the only caller that reaches into it on the LLM's behalf.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, RegisteredTool>,
    search_tags: DashMap<String, Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            search_tags: DashMap::new(),
        }
    }

    /// Registers a tool under the given source tag. Fails if the name doesn't
    /// match `^[a-z][a-z0-9_]*$`, or if a tool is already registered under
    /// that name and `update_executor` is false.
    pub fn register(
        &self,
        tool: Arc<dyn Tool>,
        source: impl Into<String>,
        update_executor: bool,
    ) -> Result<(), String> {
        let name = tool.name().to_string();
        if !NAME_PATTERN.is_match(&name) {
            return Err(format!(
                "tool name '{}' does not match ^[a-z][a-z0-9_]*$",
                name
            ));
        }
        if self.tools.contains_key(&name) && !update_executor {
            return Err(format!(
                "tool '{}' is already registered; pass update_executor to replace it",
                name
            ));
        }
        self.tools.insert(
            name,
            RegisteredTool {
                tool,
                source: source.into(),
            },
        );
        Ok(())
    }

    /// Sets curated extra search terms for `name` (spec.md §4.A's
    /// `searchTags[name]` overlay), consulted by `search_tools` alongside the
    /// tool's own name/description/category/tags.
    pub fn set_search_tags(&self, name: &str, tags: Vec<String>) {
        self.search_tags.insert(name.to_string(), tags);
    }

    /// Curated search tags for `name`, empty if none were set.
    pub fn search_tags(&self, name: &str) -> Vec<String> {
        self.search_tags.get(name).map(|e| e.clone()).unwrap_or_default()
    }

    /// Removes a tool by name. Returns whether a tool was actually removed.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Removes every tool registered under the given source tag (e.g. all
    /// core stubs superseded by a plugin).
    pub fn unregister_by_names(&self, names: &[String]) {
        for name in names {
            self.tools.remove(name);
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| Arc::clone(&entry.tool))
    }

    pub fn get_definition(&self, name: &str) -> Option<ToolSpec> {
        self.tools.get(name).map(|entry| entry.tool.spec())
    }

    pub fn source_of(&self, name: &str) -> Option<String> {
        self.tools.get(name).map(|entry| entry.source.clone())
    }

    /// All registered tool specs, in no guaranteed order. Callers that need
    /// stable ordering should sort by name.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|entry| entry.tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
