//! Domain models for the storefront.
//!
//! These are the normalized shapes the rest of the crate works with. Raw
//! backend payloads live in [`crate::api::types`] and are converted at the
//! API boundary.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;

pub use address::{Address, AddressRef, GeoRef, NewAddress};
pub use cart::{Cart, CartLine, SavedItem, clamp_quantity};
pub use catalog::{Category, ContactType, Product, ProductQuery, SortOrder, apply_filters};
pub use order::{OrderDetails, OrderItem, OrderSummary};
