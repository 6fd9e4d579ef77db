//! Tool-calling agent loop.
//!
//! Each step asks the model for one JSON action: call a tool or give the
//! final answer. Tool results are fed back as observations in a scratchpad
//! that lives only for the current turn.

use concierge_core::{ConciergeError, Message};
use concierge_memory::History;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::prompt::vars;
use crate::stage::{Memory, Stage, StageOutput};
use crate::structured::extract_json;
use crate::tool_dispatcher::{ToolCall, ToolDispatcher, ToolResult};

const DEFAULT_MAX_STEPS: usize = 5;

/// One model decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Tool {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    Final {
        output: String,
    },
}

pub struct ExecutorInput<'a> {
    pub customer_id: &'a str,
    pub text: &'a str,
    pub history: Option<&'a History>,
}

pub struct ToolExecutor {
    stage: Stage,
    tools: ToolDispatcher,
    max_steps: usize,
}

impl ToolExecutor {
    /// `stage` renders with `customer_id`, `customer_input` and `tools`.
    pub fn new(stage: Stage, tools: ToolDispatcher) -> Self {
        Self {
            stage,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn tools(&self) -> &ToolDispatcher {
        &self.tools
    }

    /// Run the loop until the model answers, a direct tool returns, or the
    /// step limit is hit.
    #[instrument(skip_all, fields(customer_id = %input.customer_id))]
    pub async fn run(&self, input: ExecutorInput<'_>) -> Result<StageOutput, ConciergeError> {
        let prompt_vars = vars([
            ("customer_id", input.customer_id.to_string()),
            ("customer_input", input.text.to_string()),
            ("tools", self.tools.describe()),
        ]);
        let (system, human) = self.stage.template().render(&prompt_vars)?;
        let memory = match input.history {
            Some(history) => Memory::Attached { history, input: input.text },
            None => Memory::Detached,
        };
        let history = self.stage.history_for(memory).await;

        let mut scratchpad = String::new();
        for step in 1..=self.max_steps {
            let prompt = if scratchpad.is_empty() {
                human.clone()
            } else {
                format!("{human}\n\nPrevious steps:\n{scratchpad}")
            };
            let reply = self
                .stage
                .complete(system.clone(), history.clone(), prompt)
                .await?;
            debug!(step, "Agent step");

            let action = match decide(&reply) {
                Ok(action) => action,
                Err(error) => {
                    warn!(step, error = %error, "Agent replied with an invalid action");
                    scratchpad.push_str(&format!(
                        "Reply: {}\nObservation: invalid action ({error}). Reply with one JSON action.\n",
                        reply.trim()
                    ));
                    continue;
                }
            };

            match action {
                AgentAction::Final { output } => {
                    info!(step, "Agent produced final answer");
                    return Ok(finish(output, memory));
                }
                AgentAction::Tool { tool, arguments } => {
                    let arguments = bind_customer(arguments, input.customer_id, input.text);
                    let call = ToolCall { name: tool, arguments };
                    let action_json = serde_json::to_string(&call).unwrap_or_default();
                    let result = self.tools.execute(call).await;

                    if let ToolResult::Output { text, direct: true } = result {
                        info!(step, "Tool returned directly");
                        return Ok(finish(text, memory));
                    }
                    scratchpad.push_str(&format!(
                        "Action: {action_json}\nObservation: {}\n",
                        result.observation(&self.tools.tool_names())
                    ));
                }
            }
        }

        Err(ConciergeError::generation(
            self.stage.provider_name(),
            format!("agent did not finish within {} steps", self.max_steps),
        ))
    }
}

/// A reply without any JSON object is taken as the final answer.
fn decide(reply: &str) -> Result<AgentAction, String> {
    match extract_json(reply) {
        None => Ok(AgentAction::Final {
            output: reply.trim().to_string(),
        }),
        Some(json) => serde_json::from_str(json).map_err(|e| e.to_string()),
    }
}

/// Tools always act for the authenticated customer on the raw customer text,
/// whatever the model put in those fields.
fn bind_customer(arguments: Value, customer_id: &str, text: &str) -> Value {
    let mut map = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("customer_id".into(), Value::String(customer_id.to_string()));
    map.insert("customer_input".into(), Value::String(text.to_string()));
    Value::Object(map)
}

fn finish(text: String, memory: Memory<'_>) -> StageOutput {
    let append = match memory {
        Memory::Detached => Vec::new(),
        Memory::Attached { input, .. } => vec![Message::user(input), Message::assistant(text.clone())],
    };
    StageOutput { text, append }
}
