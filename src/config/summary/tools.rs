//! Tools config block for run config summary.
//!
//! Implements [`ConfigSection`](super::ConfigSection). Used by CLI to build the
//! "Tools" line: which tool sources are wired in, and the web-search provider
//! base URL when one is configured.

use super::ConfigSection;

/// Tools configuration summary: registered source tags and, when a web-search
/// tool source is configured, its API base URL.
pub struct ToolConfigSummary {
    /// Registered tool source tags, e.g. `["core", "plugin:email"]`.
    pub sources: Vec<String>,
    /// Web-search provider API base, when a web-search tool source is configured.
    pub exa_url: Option<String>,
}

impl ConfigSection for ToolConfigSummary {
    fn section_name(&self) -> &str {
        "Tools"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("sources", self.sources.join(","))];
        if let Some(ref url) = self.exa_url {
            out.push(("exa_url", url.clone()));
        }
        out
    }
}
