//! Generation parameters shared by every stage.

/// Configuration for the model behind a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Most recent history messages attached to memory-aware stages.
    pub history_window: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            history_window: 20,
        }
    }
}

impl ModelConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
