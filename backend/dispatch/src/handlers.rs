/// Handler variants.
///
/// * [`ReasoningResponseHandler`]: memory-free reasoning, then a
///   memory-attached response.
/// * [`ToolInvokingHandler`]: delegates to the tool-calling executor.
/// * [`ChitchatFallbackHandler`]: engaged when classification fails; either
///   answers small talk or names the intent to re-route to.
use std::sync::Arc;

use async_trait::async_trait;
use concierge_agent::{
    ExecutorInput, Memory, ModelConfig, PromptVars, Stage, ToolExecutor, format_instructions, vars,
};
use concierge_core::{ConciergeError, LlmProvider};
use concierge_store::Catalog;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::handler::{Handler, HandlerOutcome, Reply, SessionContext};
use crate::pipelines;

pub const CHITCHAT_INTENT: &str = "chitchat";

// ---------------------------------------------------------------------------
// Reasoning → response
// ---------------------------------------------------------------------------

/// The memory-free first phase of a reasoning/response pipeline.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Variables for the response stage. Must include `customer_input`.
    async fn reason(&self, text: &str) -> Result<PromptVars, ConciergeError>;
}

pub struct ReasoningResponseHandler {
    name: String,
    reasoner: Arc<dyn Reasoner>,
    response: Stage,
}

impl ReasoningResponseHandler {
    pub fn new(name: impl Into<String>, reasoner: Arc<dyn Reasoner>, response: Stage) -> Self {
        Self {
            name: name.into(),
            reasoner,
            response,
        }
    }
}

#[async_trait]
impl Handler for ReasoningResponseHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        text: &str,
        session: &SessionContext,
    ) -> Result<HandlerOutcome, ConciergeError> {
        let reasoning = self.reasoner.reason(text).await?;
        debug!(handler = %self.name, "Reasoning phase complete");

        let output = self
            .response
            .run(
                &reasoning,
                Memory::Attached {
                    history: &session.history,
                    input: text,
                },
            )
            .await?;
        Ok(HandlerOutcome::Reply(output.into()))
    }
}

#[derive(Debug, Deserialize)]
struct ProductCategory {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    products: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ProductQueryResult {
    results: Vec<ProductCategory>,
}

/// Finds the catalog records a product question is about.
pub struct ProductReasoner {
    catalog: Arc<Catalog>,
    stage: Stage,
}

impl ProductReasoner {
    pub fn new(catalog: Arc<Catalog>, provider: Arc<dyn LlmProvider>, config: ModelConfig) -> Self {
        Self {
            catalog,
            stage: Stage::new("product_reasoning", pipelines::product_reasoning(), provider, config),
        }
    }

    /// Pretty JSON for every product in a named category, then every named product.
    fn product_info(&self, results: &[ProductCategory]) -> String {
        let mut info = String::new();
        for result in results {
            if let Some(category) = &result.category {
                for product in self.catalog.products_in_category(category) {
                    push_record(&mut info, product);
                }
            }
            for name in result.products.iter().flatten() {
                match self.catalog.product_by_name(name) {
                    Some(product) => push_record(&mut info, product),
                    None => warn!(product = %name, "Product not found in catalog"),
                }
            }
        }
        info
    }
}

fn push_record(info: &mut String, product: &concierge_store::ProductRecord) {
    if let Ok(json) = serde_json::to_string_pretty(product) {
        info.push_str(&json);
        info.push('\n');
    }
}

#[async_trait]
impl Reasoner for ProductReasoner {
    async fn reason(&self, text: &str) -> Result<PromptVars, ConciergeError> {
        let query: ProductQueryResult = self
            .stage
            .run_structured(
                &vars([
                    ("customer_input", text.to_string()),
                    ("categories", self.catalog.categories_listing()),
                    ("products", self.catalog.products_listing()),
                    ("format_instructions", format_instructions(pipelines::PRODUCT_QUERY_EXAMPLE)),
                ]),
                Memory::Detached,
            )
            .await?;

        Ok(vars([
            ("customer_input", text.to_string()),
            ("product_info", self.product_info(&query.results)),
        ]))
    }
}

// ---------------------------------------------------------------------------
// Tool-driven
// ---------------------------------------------------------------------------

pub struct ToolInvokingHandler {
    name: String,
    executor: ToolExecutor,
}

impl ToolInvokingHandler {
    pub fn new(name: impl Into<String>, executor: ToolExecutor) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }
}

#[async_trait]
impl Handler for ToolInvokingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        text: &str,
        session: &SessionContext,
    ) -> Result<HandlerOutcome, ConciergeError> {
        let output = self
            .executor
            .run(ExecutorInput {
                customer_id: session.customer_id(),
                text,
                history: Some(&session.history),
            })
            .await?;
        Ok(HandlerOutcome::Reply(output.into()))
    }
}

// ---------------------------------------------------------------------------
// Fallback / clarification
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChitchatCheck {
    chitchat: bool,
}

#[derive(Debug, Deserialize)]
struct RouterDecision {
    intent: String,
}

pub struct ChitchatFallbackHandler {
    possible_intentions: String,
    check: Stage,
    router: Stage,
    response: Stage,
}

impl ChitchatFallbackHandler {
    /// `intents` are the registry labels the router may pick from.
    pub fn new(intents: &[String], provider: Arc<dyn LlmProvider>, config: ModelConfig) -> Self {
        let possible_intentions = intents
            .iter()
            .map(String::as_str)
            .chain([CHITCHAT_INTENT])
            .map(|label| format!("- {}", display_intent(label)))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            possible_intentions,
            check: Stage::new(
                "chitchat_check",
                pipelines::chitchat_check(),
                provider.clone(),
                config.clone(),
            ),
            router: Stage::new("router", pipelines::router(), provider.clone(), config.clone()),
            response: Stage::new("chitchat_response", pipelines::chitchat_response(), provider, config),
        }
    }

    async fn chitchat(&self, text: &str, memory: Memory<'_>) -> Result<HandlerOutcome, ConciergeError> {
        let output = self
            .response
            .run(&vars([("customer_input", text)]), memory)
            .await?;
        Ok(HandlerOutcome::Reply(Reply::from(output)))
    }
}

#[async_trait]
impl Handler for ChitchatFallbackHandler {
    fn name(&self) -> &str {
        "chitchat_fallback"
    }

    async fn invoke(
        &self,
        text: &str,
        session: &SessionContext,
    ) -> Result<HandlerOutcome, ConciergeError> {
        let memory = Memory::Attached {
            history: &session.history,
            input: text,
        };

        let check: ChitchatCheck = self
            .check
            .run_structured(
                &vars([
                    ("customer_input", text.to_string()),
                    ("possible_intentions", self.possible_intentions.clone()),
                    ("format_instructions", format_instructions(pipelines::CHITCHAT_CHECK_EXAMPLE)),
                ]),
                memory,
            )
            .await?;
        if check.chitchat {
            info!("Fallback classified message as chit-chat");
            return self.chitchat(text, memory).await;
        }

        let decision: RouterDecision = self
            .router
            .run_structured(
                &vars([
                    ("customer_input", text.to_string()),
                    ("possible_intentions", self.possible_intentions.clone()),
                    ("format_instructions", format_instructions(pipelines::ROUTER_EXAMPLE)),
                ]),
                memory,
            )
            .await?;

        let intent = normalize_intent(&decision.intent);
        info!(intent = %intent, raw = %decision.intent, "Fallback router picked an intent");
        if intent == CHITCHAT_INTENT {
            return self.chitchat(text, memory).await;
        }
        Ok(HandlerOutcome::Reroute(intent))
    }
}

/// `"Order Status"` → `order_status`.
pub fn normalize_intent(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// `order_status` → `"Order Status"`.
pub fn display_intent(label: &str) -> String {
    label
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
