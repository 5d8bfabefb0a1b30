//! Catalog models: products, categories and the product filter.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craftmart_core::{CategoryId, ContactTypeId, ProductId};

/// A product listed for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: Option<String>,
    pub actual_price: Option<Decimal>,
    pub discounted_price: Option<Decimal>,
    pub images: Vec<String>,
    pub stock: Option<u32>,
    pub category: Option<Category>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Price the shopper pays: discounted, else actual, else zero.
    #[must_use]
    pub fn price(&self) -> Decimal {
        self.discounted_price
            .or(self.actual_price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Returns `true` unless stock is known to be zero.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock != Some(0)
    }

    /// First image, used as the grid thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product category from the master taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

/// A contact-form enquiry type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactType {
    pub id: ContactTypeId,
    pub name: String,
}

/// Product listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Relevance,
    PriceLowToHigh,
    PriceHighToLow,
    Newest,
}

impl SortOrder {
    /// Query parameter value understood by the listing endpoint.
    #[must_use]
    pub const fn as_param(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::PriceLowToHigh => "price_asc",
            Self::PriceHighToLow => "price_desc",
            Self::Newest => "newest",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "price_asc" | "price-asc" | "low" => Ok(Self::PriceLowToHigh),
            "price_desc" | "price-desc" | "high" => Ok(Self::PriceHighToLow),
            "newest" | "new" => Ok(Self::Newest),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Product listing filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock_only: bool,
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            min_price: None,
            max_price: None,
            in_stock_only: false,
            sort: SortOrder::default(),
            page: 1,
            page_size: 24,
        }
    }
}

impl ProductQuery {
    /// Query-string pairs for the listing endpoint.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.page_size.max(1).to_string()),
            ("sort", self.sort.as_param().to_string()),
        ];
        if let Some(category) = self.category {
            params.push(("category_id", category.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if let Some(min) = self.min_price {
            params.push(("min_price", min.to_string()));
        }
        if let Some(max) = self.max_price {
            params.push(("max_price", max.to_string()));
        }
        if self.in_stock_only {
            params.push(("in_stock", "true".to_string()));
        }
        params
    }
}

/// Apply `query` to an already-fetched listing.
///
/// The backend honours only some of the filter parameters, so the listing is
/// re-filtered and re-sorted locally. Relevance keeps the server order.
#[must_use]
pub fn apply_filters(products: Vec<Product>, query: &ProductQuery) -> Vec<Product> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut filtered: Vec<Product> = products
        .into_iter()
        .filter(|p| {
            query.category.is_none_or(|wanted| {
                p.category
                    .as_ref()
                    .is_some_and(|c| c.id == wanted || c.parent_id == Some(wanted))
            })
        })
        .filter(|p| {
            needle
                .as_deref()
                .is_none_or(|n| p.title.to_lowercase().contains(n))
        })
        .filter(|p| query.min_price.is_none_or(|min| p.price() >= min))
        .filter(|p| query.max_price.is_none_or(|max| p.price() <= max))
        .filter(|p| !query.in_stock_only || p.in_stock())
        .collect();

    match query.sort {
        SortOrder::Relevance => {}
        SortOrder::PriceLowToHigh => filtered.sort_by_key(Product::price),
        SortOrder::PriceHighToLow => filtered.sort_by_key(|p| std::cmp::Reverse(p.price())),
        SortOrder::Newest => filtered.sort_by_key(|p| std::cmp::Reverse(p.created_at)),
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, title: &str, price: i64, stock: Option<u32>, category: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: title.to_string(),
            description: None,
            actual_price: Some(Decimal::from(price)),
            discounted_price: None,
            images: vec![],
            stock,
            category: Some(Category {
                id: CategoryId::new(category),
                name: format!("Category {category}"),
                parent_id: Some(CategoryId::new(100)),
            }),
            created_at: DateTime::from_timestamp(id * 1000, 0),
        }
    }

    fn listing() -> Vec<Product> {
        vec![
            product(1, "Block-print cushion", 450, Some(3), 1),
            product(2, "Terracotta planter", 700, Some(0), 2),
            product(3, "Brass diya", 300, None, 2),
            product(4, "Cushion cover set", 900, Some(10), 1),
        ]
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id.as_i64()).collect()
    }

    #[test]
    fn test_default_query_keeps_server_order() {
        let result = apply_filters(listing(), &ProductQuery::default());
        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = ProductQuery {
            search: Some("CUSHION".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(ids(&apply_filters(listing(), &query)), vec![1, 4]);
    }

    #[test]
    fn test_price_range_and_stock() {
        let query = ProductQuery {
            min_price: Some(Decimal::from(400)),
            max_price: Some(Decimal::from(800)),
            in_stock_only: true,
            ..ProductQuery::default()
        };
        assert_eq!(ids(&apply_filters(listing(), &query)), vec![1]);
    }

    #[test]
    fn test_category_matches_parent() {
        let query = ProductQuery {
            category: Some(CategoryId::new(2)),
            ..ProductQuery::default()
        };
        assert_eq!(ids(&apply_filters(listing(), &query)), vec![2, 3]);

        let parent = ProductQuery {
            category: Some(CategoryId::new(100)),
            ..ProductQuery::default()
        };
        assert_eq!(apply_filters(listing(), &parent).len(), 4);
    }

    #[test]
    fn test_sorting() {
        let asc = ProductQuery {
            sort: SortOrder::PriceLowToHigh,
            ..ProductQuery::default()
        };
        assert_eq!(ids(&apply_filters(listing(), &asc)), vec![3, 1, 2, 4]);

        let newest = ProductQuery {
            sort: SortOrder::Newest,
            ..ProductQuery::default()
        };
        assert_eq!(ids(&apply_filters(listing(), &newest)), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_to_params() {
        let query = ProductQuery {
            search: Some("  ".to_string()),
            max_price: Some(Decimal::from(500)),
            ..ProductQuery::default()
        };
        let params = query.to_params();
        assert!(params.contains(&("max_price", "500".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "search"));
    }

    #[test]
    fn test_sort_order_from_str() {
        assert_eq!("price_desc".parse::<SortOrder>(), Ok(SortOrder::PriceHighToLow));
        assert!("cheapest".parse::<SortOrder>().is_err());
    }
}
