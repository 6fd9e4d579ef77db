//! One prompt → model → text step.
//!
//! A stage is either memory-free (`Memory::Detached`) or reads prior turns
//! (`Memory::Attached`). Attached stages never write to the history
//! themselves: the output carries the messages the caller should append.

use std::sync::Arc;
use std::time::Instant;

use concierge_core::{ConciergeError, LlmProvider, LlmRequest, Message};
use concierge_memory::History;
use tracing::{debug, instrument};

use crate::context_window::ContextWindow;
use crate::model_config::ModelConfig;
use crate::prompt::{PromptTemplate, PromptVars};

/// How a stage relates to the conversation history.
#[derive(Clone, Copy)]
pub enum Memory<'a> {
    Detached,
    Attached {
        history: &'a History,
        /// Customer text recorded as the user side of the turn.
        input: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub text: String,
    /// `[user(input), assistant(text)]` for attached stages, empty otherwise.
    pub append: Vec<Message>,
}

pub struct Stage {
    name: String,
    template: PromptTemplate,
    provider: Arc<dyn LlmProvider>,
    config: ModelConfig,
}

impl Stage {
    pub fn new(
        name: impl Into<String>,
        template: PromptTemplate,
        provider: Arc<dyn LlmProvider>,
        config: ModelConfig,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            provider,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[instrument(skip_all, fields(stage = %self.name))]
    pub async fn run(
        &self,
        vars: &PromptVars,
        memory: Memory<'_>,
    ) -> Result<StageOutput, ConciergeError> {
        let (system, human) = self.template.render(vars)?;
        let history = self.history_for(memory).await;
        let text = self.complete(system, history, human).await?;

        let append = match memory {
            Memory::Detached => Vec::new(),
            Memory::Attached { input, .. } => {
                vec![Message::user(input), Message::assistant(text.clone())]
            }
        };
        Ok(StageOutput { text, append })
    }

    pub(crate) async fn history_for(&self, memory: Memory<'_>) -> Vec<Message> {
        match memory {
            Memory::Detached => Vec::new(),
            Memory::Attached { history, .. } => {
                let snapshot = history.snapshot().await;
                let window = ContextWindow::build(&snapshot, self.config.history_window);
                if window.dropped > 0 {
                    debug!(dropped = window.dropped, "History trimmed to context window");
                }
                window.messages
            }
        }
    }

    /// Single model call. Provider failures become generation errors.
    pub(crate) async fn complete(
        &self,
        system_prompt: String,
        history: Vec<Message>,
        user_prompt: String,
    ) -> Result<String, ConciergeError> {
        let request = LlmRequest {
            model: self.config.model.clone(),
            system_prompt,
            history,
            user_prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let started = Instant::now();
        let response = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| ConciergeError::generation(self.provider.name(), e))?;

        debug!(
            provider = %response.provider,
            model = %response.model,
            tokens = response.tokens_used,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        );
        Ok(response.content)
    }
}
