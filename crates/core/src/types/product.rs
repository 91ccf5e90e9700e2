//! Product records listed on the dashboard.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::status::StockStatus;

/// A product as returned by `GET /products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Category (e.g. "Dairy", "Beverage").
    #[serde(rename = "type")]
    pub kind: String,
    /// Units currently on the shelf.
    #[serde(alias = "quantity_in_store")]
    pub quantity: u32,
    /// Aisle label.
    pub aisle: String,
    /// Shelf label.
    pub shelf: String,
}

impl Product {
    /// Stock status of this product for the given low-stock threshold.
    #[must_use]
    pub const fn status(&self, low_stock_threshold: u32) -> StockStatus {
        StockStatus::classify(self.quantity, low_stock_threshold)
    }
}

/// Headline counts for the dashboard overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    /// Number of distinct products.
    pub total: usize,
    /// Products with nothing on the shelf.
    pub out_of_stock: usize,
    /// Products at or below the threshold but not empty.
    pub low_stock: usize,
}

impl InventorySummary {
    /// Tally a product list.
    #[must_use]
    pub fn from_products(products: &[Product], low_stock_threshold: u32) -> Self {
        products
            .iter()
            .fold(Self::default(), |mut summary, product| {
                summary.total += 1;
                match product.status(low_stock_threshold) {
                    StockStatus::OutOfStock => summary.out_of_stock += 1,
                    StockStatus::LowStock => summary.low_stock += 1,
                    StockStatus::InStock => {}
                }
                summary
            })
    }
}
