//! Order tools: create an order, look one up, list a customer's orders.
//!
//! Every tool receives `customer_id` and `customer_input` from the executor.
//! Extraction of product/quantity and order ids runs as memory-free
//! structured stages on the raw customer text.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_agent::{format_instructions, vars, Memory, ModelConfig, PromptTemplate, Stage};
use concierge_core::{LlmProvider, Tool, ToolRegistry};
use concierge_store::{CreateOrderOutcome, OrderLookup, OrderStore};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const NOT_AUTHORIZED: &str = "You are not authorized to view this order.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderInformation {
    pub product_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderId {
    pub order_id: i64,
}

fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}

fn customer_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "customer_input": {
                "type": "string",
                "description": "The customer's request, verbatim"
            }
        },
        "required": ["customer_input"]
    })
}

/// All order tools over one store, ready for a `ToolExecutor`.
pub fn order_tools(
    store: Arc<OrderStore>,
    provider: Arc<dyn LlmProvider>,
    config: ModelConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CreateOrderTool::new(
        store.clone(),
        provider.clone(),
        config.clone(),
    )));
    registry.register(Arc::new(GetOrderTool::new(store.clone(), provider, config)));
    registry.register(Arc::new(ListOrdersTool::new(store)));
    registry
}

// ---------------------------------------------------------------------------
// create_order
// ---------------------------------------------------------------------------

pub struct CreateOrderTool {
    store: Arc<OrderStore>,
    extractor: Stage,
}

impl CreateOrderTool {
    pub fn new(store: Arc<OrderStore>, provider: Arc<dyn LlmProvider>, config: ModelConfig) -> Self {
        let template = PromptTemplate::new(
            "
            You are a part of the e-commerce team.
            Your task is to identify the product name and quantity from the user input.

            Here is the list of available products:
            {products_list}

            {format_instructions}
            ",
            "Customer Query: {customer_input}",
        );
        Self {
            store,
            extractor: Stage::new("order_information", template, provider, config),
        }
    }
}

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &str {
        "create_order"
    }

    fn description(&self) -> &str {
        "Create a new order in the e-commerce database for the current customer."
    }

    fn parameters(&self) -> Value {
        customer_parameters()
    }

    fn returns_direct(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let customer_id = required_str(&args, "customer_id")?;
        let customer_input = required_str(&args, "customer_input")?;

        let products = match self.store.product_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list products");
                return Ok("An error occurred while creating the order.".to_string());
            }
        };
        let products_list = products
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");

        let info: OrderInformation = self
            .extractor
            .run_structured(
                &vars([
                    ("products_list", products_list),
                    ("customer_input", customer_input.to_string()),
                    (
                        "format_instructions",
                        format_instructions(r#"{"product_name": "SmartX ProPhone", "quantity": 2}"#),
                    ),
                ]),
                Memory::Detached,
            )
            .await?;

        let outcome = self
            .store
            .create_order(customer_id, &info.product_name, info.quantity)
            .await;
        Ok(match outcome {
            Ok(CreateOrderOutcome::Created(order)) => {
                info!(order_id = order.order_id, "Order created by tool");
                format!("Order created with ID: {}", order.order_id)
            }
            Ok(CreateOrderOutcome::UnknownProduct(name)) => format!(
                "I couldn't find a product named {name}. Please check the product name and try again."
            ),
            Ok(CreateOrderOutcome::InvalidQuantity(_)) => {
                "The quantity must be at least 1.".to_string()
            }
            Err(e) => {
                warn!(error = %e, "Order insert failed");
                "An error occurred while creating the order.".to_string()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// get_order
// ---------------------------------------------------------------------------

pub struct GetOrderTool {
    store: Arc<OrderStore>,
    extractor: Stage,
}

impl GetOrderTool {
    pub fn new(store: Arc<OrderStore>, provider: Arc<dyn LlmProvider>, config: ModelConfig) -> Self {
        let template = PromptTemplate::new(
            "
            You are a part of the e-commerce team.
            Your task is to identify the order_id from the user input.

            {format_instructions}
            ",
            "Customer Query: {customer_input}",
        );
        Self {
            store,
            extractor: Stage::new("order_id", template, provider, config),
        }
    }
}

#[async_trait]
impl Tool for GetOrderTool {
    fn name(&self) -> &str {
        "get_order"
    }

    fn description(&self) -> &str {
        "Retrieve details of an existing order based on the order ID mentioned by the customer."
    }

    fn parameters(&self) -> Value {
        customer_parameters()
    }

    fn returns_direct(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let customer_id = required_str(&args, "customer_id")?;
        let customer_input = required_str(&args, "customer_input")?;

        let OrderId { order_id } = self
            .extractor
            .run_structured(
                &vars([
                    ("customer_input", customer_input.to_string()),
                    ("format_instructions", format_instructions(r#"{"order_id": 42}"#)),
                ]),
                Memory::Detached,
            )
            .await?;

        Ok(match self.store.get_order(customer_id, order_id).await {
            Ok(OrderLookup::Found(order)) => order.summary(),
            Ok(OrderLookup::Unauthorized) => {
                warn!(customer_id, order_id, "Order lookup denied");
                NOT_AUTHORIZED.to_string()
            }
            Ok(OrderLookup::NotFound) => format!("No order found with ID: {order_id}"),
            Err(e) => {
                warn!(error = %e, "Order lookup failed");
                "An error occurred while retrieving the order.".to_string()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// list_orders
// ---------------------------------------------------------------------------

pub struct ListOrdersTool {
    store: Arc<OrderStore>,
}

impl ListOrdersTool {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListOrdersTool {
    fn name(&self) -> &str {
        "list_orders"
    }

    fn description(&self) -> &str {
        "List the current customer's orders, newest first. Use it for questions like 'my last order'."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let customer_id = required_str(&args, "customer_id")?;

        let orders = match self.store.orders_for_customer(customer_id).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Order listing failed");
                return Ok("An error occurred while retrieving your orders.".to_string());
            }
        };
        if orders.is_empty() {
            return Ok("No orders found for this customer.".to_string());
        }
        Ok(orders
            .iter()
            .map(|o| o.summary())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
