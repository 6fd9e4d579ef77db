pub mod orders;

pub use orders::{order_tools, CreateOrderTool, GetOrderTool, ListOrdersTool, OrderId, OrderInformation};
