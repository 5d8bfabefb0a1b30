//! Cache types for catalog and master data.

use craftmart_core::{CityId, CountryId, ProductId, StateId};

use crate::models::{Category, ContactType, GeoRef, Product, ProductQuery};

/// Cache key for catalog listings and geo master data.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products(ProductQuery),
    Categories,
    Countries,
    States(CountryId),
    Cities(StateId),
    ContactTypes,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
    Categories(Vec<Category>),
    Countries(Vec<GeoRef<CountryId>>),
    States(Vec<GeoRef<StateId>>),
    Cities(Vec<GeoRef<CityId>>),
    ContactTypes(Vec<ContactType>),
}
