//! Dispatcher for agent tool calls.
//!
//! Routes the model's requested tool invocations to the registered tools.

use concierge_core::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Output {
        text: String,
        /// The tool asked for its output to be the final answer.
        direct: bool,
    },
    UnknownTool(String),
    Failed(String),
}

impl ToolResult {
    /// Observation text fed back to the model.
    pub fn observation(&self, available: &[String]) -> String {
        match self {
            ToolResult::Output { text, .. } => text.clone(),
            ToolResult::UnknownTool(name) => format!(
                "There is no tool named {name}. Available tools: {}",
                available.join(", ")
            ),
            ToolResult::Failed(error) => format!("The tool failed: {error}"),
        }
    }
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn describe(&self) -> String {
        self.registry.describe()
    }

    /// Dispatch a single tool call to the corresponding tool.
    pub async fn execute(&self, call: ToolCall) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolResult::UnknownTool(call.name);
        };

        debug!(tool = %call.name, "Executing tool");
        match tool.execute(call.arguments).await {
            Ok(text) => ToolResult::Output {
                text,
                direct: tool.returns_direct(),
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::Failed(e.to_string())
            }
        }
    }
}
