use std::collections::BTreeMap;
use std::sync::Arc;

use crate::traits::Tool;

/// Tools available to the order agent, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One `- name: description (parameters: {...})` line per tool, for prompts.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {} (parameters: {})", t.name(), t.description(), t.parameters()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Repeat the input"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> anyhow::Result<String> {
            Ok(args.to_string())
        }
    }

    #[test]
    fn test_register_and_describe() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(Echo));

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.list(), vec!["echo".to_string()]);
        assert_eq!(
            registry.describe(),
            "- echo: Repeat the input (parameters: {\"type\":\"object\"})"
        );
    }
}
