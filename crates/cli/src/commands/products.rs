//! Inventory commands.

use std::io::{self, Write};

use stockwatch_client::AppState;
use stockwatch_core::{InventorySummary, Product};

use super::{CommandError, require_session};

/// Print the product table.
pub async fn list(state: &AppState) -> Result<(), CommandError> {
    require_session(state).await?;
    let products = state.products().list().await?;

    let threshold = state.products().low_stock_threshold();
    render_products(&mut io::stdout().lock(), &products, threshold)?;
    Ok(())
}

/// Print the stat cards followed by the product table.
pub async fn dashboard(state: &AppState) -> Result<(), CommandError> {
    require_session(state).await?;
    let dashboard = state.products().dashboard().await?;

    let threshold = state.products().low_stock_threshold();
    let mut out = io::stdout().lock();
    if let Some(session) = state.session().session() {
        writeln!(out, "Welcome, {}", session.display_name())?;
    }
    render_summary(&mut out, &dashboard.summary)?;
    writeln!(out)?;
    render_products(&mut out, &dashboard.products, threshold)?;
    Ok(())
}

fn render_summary(out: &mut impl Write, summary: &InventorySummary) -> io::Result<()> {
    writeln!(out, "Products:     {}", summary.total)?;
    writeln!(out, "Low Stock:    {}", summary.low_stock)?;
    writeln!(out, "Out of Stock: {}", summary.out_of_stock)
}

fn render_products(out: &mut impl Write, products: &[Product], threshold: u32) -> io::Result<()> {
    if products.is_empty() {
        return writeln!(out, "No products found.");
    }

    let name_width = products
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let kind_width = products
        .iter()
        .map(|p| p.kind.chars().count())
        .max()
        .unwrap_or(0)
        .max("Type".len());

    writeln!(
        out,
        "{:<name_width$}  {:<kind_width$}  {:>5}  {:<6}  {:<6}  Status",
        "Name", "Type", "Qty", "Aisle", "Shelf"
    )?;
    for product in products {
        writeln!(
            out,
            "{:<name_width$}  {:<kind_width$}  {:>5}  {:<6}  {:<6}  {}",
            product.name,
            product.kind,
            product.quantity,
            product.aisle,
            product.shelf,
            product.status(threshold)
        )?;
    }
    Ok(())
}
