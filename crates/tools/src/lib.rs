//! Built-in tool implementations for ToolLoop.
//!
//! Tools give the agent the ability to reach beyond the conversation.
//! The git change source supplies the material a review session starts from.

pub mod git_changes;
pub mod web_search;

pub use git_changes::GitChangeSource;
pub use web_search::WebSearchTool;

use toolloop_core::tool::ToolRegistry;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WebSearchTool::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_web_search() {
        let registry = default_registry();
        assert_eq!(registry.names(), ["web_search"]);
        assert_eq!(registry.definitions()[0].name, "web_search");
    }
}
