/// SQLite-backed order store.
///
/// Two tables: `products` (seeded from the catalog) and `orders`. Every order
/// read is filtered by the requesting customer; a mismatch is reported
/// distinctly from a missing order.
use std::path::Path;

use anyhow::{Context, Result};
use concierge_core::ConciergeError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::Catalog;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS products (
        product_id  INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        category    TEXT NOT NULL,
        price       REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS orders (
        order_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id  TEXT NOT NULL,
        product_id   INTEGER NOT NULL REFERENCES products(product_id),
        quantity     INTEGER NOT NULL,
        total_amount REAL NOT NULL,
        order_date   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: i64,
    pub customer_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub total_amount: f64,
    pub order_date: String,
}

impl Order {
    /// One-line summary used in customer-facing replies.
    pub fn summary(&self) -> String {
        format!(
            "Order {}: {} x {} (total ${:.2}, placed {})",
            self.order_id, self.quantity, self.product_name, self.total_amount, self.order_date
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOrderOutcome {
    Created(Order),
    UnknownProduct(String),
    InvalidQuantity(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderLookup {
    Found(Order),
    /// The order exists but belongs to another customer.
    Unauthorized,
    NotFound,
}

impl OrderLookup {
    pub fn into_result(self, customer_id: &str, order_id: i64) -> Result<Option<Order>, ConciergeError> {
        match self {
            OrderLookup::Found(order) => Ok(Some(order)),
            OrderLookup::NotFound => Ok(None),
            OrderLookup::Unauthorized => Err(ConciergeError::Unauthorized {
                customer_id: customer_id.to_string(),
                order_id,
            }),
        }
    }
}

pub struct OrderStore {
    conn: Mutex<Connection>,
}

impl OrderStore {
    /// Open an existing database. A missing file is a startup error; use
    /// [`OrderStore::create`] to provision one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConciergeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConciergeError::Storage(format!(
                "database not found: {} (run `concierge seed` first)",
                path.display()
            )));
        }
        let conn = Connection::open(path)
            .and_then(|conn| conn.execute_batch(SCHEMA).map(|_| conn))
            .map_err(|e| ConciergeError::Storage(format!("{}: {}", path.display(), e)))?;

        info!("OrderStore opened at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create (or reopen) a database file and seed its product table.
    pub async fn create(path: impl AsRef<Path>, catalog: &Catalog) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite order database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize order schema")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        let seeded = store.seed_products(catalog).await?;
        info!(path = %path.display(), seeded, "OrderStore created");
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub async fn in_memory(catalog: &Catalog) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.seed_products(catalog).await?;
        Ok(store)
    }

    /// Insert catalog products not already present. Returns the number inserted.
    pub async fn seed_products(&self, catalog: &Catalog) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for product in catalog.products() {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO products (name, category, price) VALUES (?1, ?2, ?3)",
                params![product.name, product.category, product.price],
            )?;
        }
        tx.commit()?;
        debug!(inserted, "Seeded products");
        Ok(inserted)
    }

    pub async fn product_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT name FROM products ORDER BY product_id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub async fn find_product(&self, name: &str) -> Result<Option<ProductRow>> {
        let conn = self.conn.lock().await;
        find_product(&conn, name)
    }

    pub async fn create_order(
        &self,
        customer_id: &str,
        product_name: &str,
        quantity: i64,
    ) -> Result<CreateOrderOutcome> {
        if quantity <= 0 {
            return Ok(CreateOrderOutcome::InvalidQuantity(quantity));
        }

        let conn = self.conn.lock().await;
        let Some(product) = find_product(&conn, product_name)? else {
            return Ok(CreateOrderOutcome::UnknownProduct(product_name.to_string()));
        };

        let total_amount = product.price * quantity as f64;
        let order_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        conn.execute(
            "INSERT INTO orders (customer_id, product_id, quantity, total_amount, order_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![customer_id, product.product_id, quantity, total_amount, order_date],
        )?;
        let order_id = conn.last_insert_rowid();
        debug!(order_id, customer_id, product = %product.name, "Order created");

        Ok(CreateOrderOutcome::Created(Order {
            order_id,
            customer_id: customer_id.to_string(),
            product_id: product.product_id,
            product_name: product.name,
            quantity,
            total_amount,
            order_date,
        }))
    }

    /// Look up an order on behalf of `customer_id`.
    pub async fn get_order(&self, customer_id: &str, order_id: i64) -> Result<OrderLookup> {
        let conn = self.conn.lock().await;
        let order = conn
            .query_row(
                &format!("{ORDER_SELECT} WHERE o.order_id = ?1"),
                params![order_id],
                row_to_order,
            )
            .optional()?;

        Ok(match order {
            None => OrderLookup::NotFound,
            Some(order) if order.customer_id != customer_id => OrderLookup::Unauthorized,
            Some(order) => OrderLookup::Found(order),
        })
    }

    /// The customer's orders, newest first.
    pub async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{ORDER_SELECT} WHERE o.customer_id = ?1 ORDER BY o.order_id DESC"
        ))?;
        let orders = stmt
            .query_map(params![customer_id], row_to_order)?
            .collect::<rusqlite::Result<Vec<Order>>>()?;
        Ok(orders)
    }
}

const ORDER_SELECT: &str = "SELECT o.order_id, o.customer_id, o.product_id, p.name, o.quantity,
        o.total_amount, o.order_date
     FROM orders o JOIN products p ON p.product_id = o.product_id";

fn find_product(conn: &Connection, name: &str) -> Result<Option<ProductRow>> {
    let row = conn
        .query_row(
            "SELECT product_id, name, category, price FROM products
             WHERE name = ?1 COLLATE NOCASE",
            params![name.trim()],
            |row| {
                Ok(ProductRow {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    price: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        order_id: row.get(0)?,
        customer_id: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        quantity: row.get(4)?,
        total_amount: row.get(5)?,
        order_date: row.get(6)?,
    })
}
