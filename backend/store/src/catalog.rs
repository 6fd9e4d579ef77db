//! Immutable product catalog.
//!
//! Loaded once at startup and shared by reference; category order follows the
//! order in which categories first appear in the source file.

use std::path::Path;

use concierge_core::ConciergeError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
}

#[derive(Deserialize)]
struct CatalogFile {
    products: Vec<ProductRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<ProductRecord>,
}

impl Catalog {
    pub fn from_products(products: Vec<ProductRecord>) -> Self {
        Self { products }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConciergeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConciergeError::Storage(format!("catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&raw)?;
        info!(path = %path.display(), products = catalog.len(), "Loaded product catalog");
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConciergeError> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| ConciergeError::Storage(format!("invalid catalog: {e}")))?;
        Ok(Self::from_products(file.products))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for product in &self.products {
            if !categories.contains(&product.category.as_str()) {
                categories.push(&product.category);
            }
        }
        categories
    }

    pub fn product_names(&self) -> Vec<&str> {
        self.products.iter().map(|p| p.name.as_str()).collect()
    }

    /// Exact name match, falling back to a case-insensitive one.
    pub fn product_by_name(&self, name: &str) -> Option<&ProductRecord> {
        let name = name.trim();
        self.products
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.products.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    pub fn products_in_category(&self, category: &str) -> Vec<&ProductRecord> {
        self.products
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    /// `- <category>` per line.
    pub fn categories_listing(&self) -> String {
        self.categories()
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Products grouped under their category headings.
    pub fn products_listing(&self) -> String {
        self.categories()
            .iter()
            .map(|category| {
                let products = self
                    .products_in_category(category)
                    .iter()
                    .map(|p| format!("  - {}", p.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{category}:\n{products}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
