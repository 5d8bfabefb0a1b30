//! Catalog browsing commands.

use craftmart_core::ProductId;
use craftmart_storefront::models::ProductQuery;
use craftmart_storefront::state::AppState;

use super::{CliError, emit};
use crate::views;

pub async fn products(state: &AppState, query: &ProductQuery) -> Result<(), CliError> {
    let products = state.catalog().products(query).await?;
    emit(&views::product_grid(&products));
    Ok(())
}

pub async fn product(state: &AppState, id: ProductId) -> Result<(), CliError> {
    let product = state.catalog().product(id).await?;
    emit(&views::product_detail(&product));
    Ok(())
}

pub async fn categories(state: &AppState) -> Result<(), CliError> {
    let categories = state.catalog().categories().await?;
    emit(&views::categories(&categories));
    Ok(())
}
