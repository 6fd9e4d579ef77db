use anyhow::Result;
use async_trait::async_trait;

use crate::message::Message;

/// A capability the order agent can invoke while answering a customer.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g., "create_order").
    fn name(&self) -> &str;

    /// Description for the LLM prompt.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// When true the tool output is handed to the customer as the final answer.
    fn returns_direct(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<String, anyhow::Error>;
}

/// Trait for text-generation backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    /// Prior turns, oldest first. Empty for memory-free stages.
    pub history: Vec<Message>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
