use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use concierge_core::{LlmProvider, LlmRequest, LlmResponse};

type Responder = Arc<dyn Fn(&LlmRequest) -> Option<String> + Send + Sync>;

/// A mock LLM provider that returns canned responses.
///
/// Resolution order per call: the responder closure (if it returns `Some`),
/// then the next scripted reply, then the fixed response. Every request is
/// recorded for inspection.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    script: Mutex<VecDeque<Result<String, String>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            script: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Queue replies returned one per call, in order.
    pub fn with_script<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        self
    }

    /// Queue a failing call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(message.into()));
        self
    }

    /// Answer from a closure inspecting the request; `None` falls through.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());

        let content = match self.responder.as_ref().and_then(|r| r(req)) {
            Some(content) => content,
            None => {
                let scripted = self
                    .script
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                match scripted {
                    Some(Ok(content)) => content,
                    Some(Err(message)) => anyhow::bail!("{}", message),
                    None => self
                        .fixed_response
                        .clone()
                        .unwrap_or_else(|| "Mock response".to_string()),
                }
            }
        };

        Ok(LlmResponse {
            content,
            provider: self.name.clone(),
            model: req.model.clone(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}
