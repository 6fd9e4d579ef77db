//! Concierge intent dispatch
//!
//! Handler contract and registry, the handler variants and their prompts,
//! the turn dispatcher, and the development review loop.

pub mod dev;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod pipelines;
pub mod registry;

use std::sync::Arc;

use concierge_agent::{ModelConfig, Stage, ToolDispatcher, ToolExecutor};
use concierge_core::LlmProvider;
use concierge_store::{Catalog, OrderStore};
use concierge_tools::order_tools;

pub use dev::{DevSession, IntentReviewer, ReviewAnswer};
pub use dispatcher::{DEFAULT_TURN_TIMEOUT, Dispatcher, TurnOutcome, user_message};
pub use handler::{Handler, HandlerOutcome, Reply, SessionContext};
pub use handlers::{
    ChitchatFallbackHandler, ProductReasoner, Reasoner, ReasoningResponseHandler,
    ToolInvokingHandler, display_intent, normalize_intent,
};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};

pub const PRODUCT_INFORMATION: &str = "product_information";
pub const CREATE_ORDER: &str = "create_order";
pub const ORDER_STATUS: &str = "order_status";

/// Build the store's handler table: product questions, the order agent for
/// both order intents, and the chit-chat fallback.
pub fn build_default_registry(
    catalog: Arc<Catalog>,
    store: Arc<OrderStore>,
    provider: Arc<dyn LlmProvider>,
    config: ModelConfig,
) -> HandlerRegistry {
    let products = Arc::new(ReasoningResponseHandler::new(
        PRODUCT_INFORMATION,
        Arc::new(ProductReasoner::new(catalog, provider.clone(), config.clone())),
        Stage::new(
            "product_response",
            pipelines::product_response(),
            provider.clone(),
            config.clone(),
        ),
    ));

    let executor = ToolExecutor::new(
        Stage::new("order_agent", pipelines::order_agent(), provider.clone(), config.clone()),
        ToolDispatcher::new(order_tools(store, provider.clone(), config.clone())),
    );
    let orders = Arc::new(ToolInvokingHandler::new("order_agent", executor));

    let intents = [PRODUCT_INFORMATION, CREATE_ORDER, ORDER_STATUS].map(String::from);
    let fallback = Arc::new(ChitchatFallbackHandler::new(&intents, provider, config));

    HandlerRegistry::builder()
        .register(PRODUCT_INFORMATION, products)
        .register(CREATE_ORDER, orders.clone())
        .register(ORDER_STATUS, orders)
        .fallback(fallback)
        .build()
}
