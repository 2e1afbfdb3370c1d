//! Concrete tool trait, registry, fuzzy-name suggestions, and the meta-tool
//! dispatcher the LLM actually sees (spec.md §2/§4.A).

mod dispatcher;
mod fuzzy;
mod registry;
mod r#trait;

pub use dispatcher::{
    BatchUseToolTool, GetToolHelpTool, MetaToolDispatcher, SearchToolsTool, UseToolTool,
    META_TOOL_NAMES, TOOL_BATCH_USE_TOOL, TOOL_GET_TOOL_HELP, TOOL_SEARCH_TOOLS, TOOL_USE_TOOL,
};
pub use fuzzy::suggest_names;
pub use r#trait::Tool;
pub use registry::{RegisteredTool, ToolRegistry};
