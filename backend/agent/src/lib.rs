//! Concierge generation pipelines
//!
//! Prompt templates, memory-aware pipeline stages, structured output parsing,
//! and the tool-calling executor used by the order handler.

pub mod context_window;
pub mod executor;
pub mod model_config;
pub mod prompt;
pub mod stage;
pub mod structured;
pub mod tool_dispatcher;

pub use context_window::ContextWindow;
pub use executor::{AgentAction, ExecutorInput, ToolExecutor};
pub use model_config::ModelConfig;
pub use prompt::{PromptTemplate, PromptVars, vars};
pub use stage::{Memory, Stage, StageOutput};
pub use structured::{extract_json, format_instructions};
pub use tool_dispatcher::{ToolCall, ToolDispatcher, ToolResult};
