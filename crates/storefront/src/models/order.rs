//! Order history models.
//!
//! Orders are created and owned by the backend; these are read-only
//! snapshots for the order history and order detail views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craftmart_core::{OrderId, OrderStatus, ProductId};

/// One row of the order history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub placed_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub item_count: u32,
}

/// A product line within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Option<ProductId>,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub image: Option<String>,
}

impl OrderItem {
    /// `quantity × unit_price`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Full snapshot of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: OrderId,
    pub placed_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub total: Decimal,
    pub shipping_address: Option<String>,
    pub tracking_url: Option<String>,
}
