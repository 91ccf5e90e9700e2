//! Stock level classification.

use serde::{Deserialize, Serialize};

/// Stock level of a product as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Nothing left on the shelf.
    OutOfStock,
    /// At or below the reorder threshold.
    LowStock,
    /// Above the reorder threshold.
    InStock,
}

impl StockStatus {
    /// Classify a quantity against an inclusive low-stock threshold.
    ///
    /// A threshold of zero disables the `LowStock` band.
    #[must_use]
    pub const fn classify(quantity: u32, low_stock_threshold: u32) -> Self {
        if quantity == 0 {
            Self::OutOfStock
        } else if quantity <= low_stock_threshold {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OutOfStock => "Out of Stock",
            Self::LowStock => "Low Stock",
            Self::InStock => "In Stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
