//! Product inventory endpoints.

use stockwatch_core::{InventorySummary, Product};
use tracing::{debug, instrument};

use super::authenticated::AuthenticatedClient;
use crate::error::ApiError;

const PRODUCTS_PATH: &str = "products";

/// Product list plus the stat-card totals shown above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub products: Vec<Product>,
    pub summary: InventorySummary,
}

/// Inventory calls made on behalf of the logged-in user.
#[derive(Debug, Clone)]
pub struct ProductsApi {
    client: AuthenticatedClient,
    low_stock_threshold: u32,
}

impl ProductsApi {
    #[must_use]
    pub const fn new(client: AuthenticatedClient, low_stock_threshold: u32) -> Self {
        Self {
            client,
            low_stock_threshold,
        }
    }

    /// Quantity at or below which a product counts as low stock.
    #[must_use]
    pub const fn low_stock_threshold(&self) -> u32 {
        self.low_stock_threshold
    }

    /// Fetch every product.
    ///
    /// # Errors
    ///
    /// - `ApiError::SessionExpired` if the credential could not be renewed
    /// - `ApiError::UnknownServer` for a non-2xx status
    /// - `ApiError::Decode` if the body is not a product list
    /// - `ApiError::Network` if no response was received
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Product>, ApiError> {
        let products: Vec<Product> = self.client.get_json(PRODUCTS_PATH).await?;
        debug!(count = products.len(), "Fetched products");
        Ok(products)
    }

    /// Fetch every product and summarise stock levels.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub async fn dashboard(&self) -> Result<Dashboard, ApiError> {
        let products = self.list().await?;
        let summary = InventorySummary::from_products(&products, self.low_stock_threshold);
        Ok(Dashboard { products, summary })
    }
}
