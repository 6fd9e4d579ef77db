pub mod catalog;
pub mod orders;

pub use catalog::{Catalog, ProductRecord};
pub use orders::{CreateOrderOutcome, Order, OrderLookup, OrderStore, ProductRow};
