//! Product catalog reads.
//!
//! Listings, product detail and the category tree are public endpoints and
//! are cached in the shared moka cache for the configured TTL.

use tracing::{debug, instrument};

use craftmart_core::ProductId;

use crate::api::cache::{CacheKey, CacheValue};
use crate::api::conversions::{convert_category, convert_product};
use crate::api::endpoints;
use crate::api::types::{CategoryDto, ProductDto, ProductListDto};
use crate::api::{ApiClient, ApiError};
use crate::error::{AppError, Result};
use crate::models::{Category, Product, ProductQuery, apply_filters};

/// Catalog reads over the shared API client.
#[derive(Debug, Clone)]
pub struct Catalog {
    api: ApiClient,
}

impl Catalog {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Products matching `query`, filtered and sorted locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be fetched.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let key = CacheKey::Products(query.clone());
        if let Some(CacheValue::Products(products)) = self.api.cache().get(&key).await {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let listing: ProductListDto = self
            .api
            .get_data_with_query(endpoints::PRODUCTS, &query.to_params())
            .await?;
        let products: Vec<Product> = listing.into_items().into_iter().map(convert_product).collect();
        let products = apply_filters(products, query);

        self.api
            .cache()
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Product> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.api.cache().get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let dto: ProductDto = match self.api.get_data(&endpoints::product(id)).await {
            Ok(dto) => dto,
            Err(ApiError::Api { status: 404, .. } | ApiError::EmptyBody) => {
                return Err(AppError::NotFound(format!("Product {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        let product = convert_product(dto);

        self.api
            .cache()
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// The category taxonomy.
    ///
    /// # Errors
    ///
    /// Returns an error if the categories cannot be fetched.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>> {
        if let Some(CacheValue::Categories(categories)) =
            self.api.cache().get(&CacheKey::Categories).await
        {
            return Ok(categories);
        }

        let dtos: Vec<CategoryDto> = self.api.get_data(endpoints::CATEGORIES).await?;
        let categories: Vec<Category> = dtos.into_iter().map(convert_category).collect();

        self.api
            .cache()
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }
}
