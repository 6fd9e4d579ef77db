use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use concierge_core::{LlmProvider, LlmRequest, LlmResponse, Message};

/// OpenAI-compatible chat-completions provider.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// System prompt, then prior turns, then the current user prompt.
fn build_messages(request: &LlmRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if !request.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        });
    }
    messages.extend(request.history.iter().map(|m: &Message| ChatMessage {
        role: m.role.as_str().to_string(),
        content: m.content.clone(),
    }));
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.user_prompt.clone(),
    });
    messages
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();

        let body = ChatRequest {
            model: request.model.clone(),
            messages: build_messages(request),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        debug!(
            model = %request.model,
            history_len = request.history.len(),
            "Sending request to OpenAI-compatible endpoint"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Chat completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion endpoint returned {}: {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        let tokens_used = chat_response
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or(0);

        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(LlmResponse {
            content,
            provider: "openai".to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms,
        })
    }
}
