//! Conversions from wire types into domain models.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use craftmart_core::{OrderStatus, Pincode};

use crate::models::{
    Address, Cart, CartLine, Category, ContactType, GeoRef, OrderDetails, OrderItem, OrderSummary,
    Product, SavedItem, clamp_quantity,
};

use super::types::{
    AddressDto, CartDto, CartItemDto, CategoryDto, ContactTypeDto, GeoDto, ImageDto,
    OrderDetailsDto, OrderItemDto, OrderSummaryDto, ProductDto, SavedProductDto,
};

/// Negative stock reads as none left; unknown stays unknown.
fn stock(raw: Option<i64>) -> Option<u32> {
    raw.map(|s| u32::try_from(s.max(0)).unwrap_or(u32::MAX))
}

/// RFC 3339, or the backend's `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

pub fn convert_category(dto: CategoryDto) -> Category {
    Category {
        id: dto.id,
        name: dto.name,
        parent_id: dto.parent_id,
    }
}

pub fn convert_product(dto: ProductDto) -> Product {
    Product {
        id: dto.id,
        title: dto.title,
        description: dto.description.filter(|d| !d.trim().is_empty()),
        actual_price: dto.actual_price,
        discounted_price: dto.discounted_price,
        images: dto.images.into_iter().map(ImageDto::into_url).collect(),
        stock: stock(dto.stock),
        category: dto.category.map(convert_category),
        created_at: parse_timestamp(dto.created_at.as_deref()),
    }
}

fn convert_cart_line(dto: CartItemDto) -> Option<CartLine> {
    let product = dto.product;
    let Some(product_id) = dto.product_id.or_else(|| product.as_ref().map(|p| p.id)) else {
        warn!(item_id = %dto.id, "Dropping cart item without a product");
        return None;
    };
    let stock = stock(product.as_ref().and_then(|p| p.stock));
    Some(CartLine {
        item_id: dto.id,
        product_id,
        title: product
            .as_ref()
            .map_or_else(|| format!("Product {product_id}"), |p| p.title.clone()),
        image: product
            .as_ref()
            .and_then(|p| p.images.first().cloned())
            .map(ImageDto::into_url),
        quantity: clamp_quantity(dto.quantity, stock),
        actual_price: product.as_ref().and_then(|p| p.actual_price),
        discounted_price: product.as_ref().and_then(|p| p.discounted_price),
        in_use: dto.in_use.unwrap_or(true),
        stock,
    })
}

/// Flatten the nested cart shape and clamp every quantity into stock.
pub fn convert_cart(dto: CartDto) -> Cart {
    Cart {
        id: dto.id,
        customer_id: dto.customer_id,
        lines: dto.items.into_iter().filter_map(convert_cart_line).collect(),
    }
}

pub fn convert_saved_item(dto: SavedProductDto) -> Option<SavedItem> {
    let product = dto.product;
    let product_id = dto.product_id.or_else(|| product.as_ref().map(|p| p.id))?;
    Some(SavedItem {
        saved_id: dto.id,
        product_id,
        title: product
            .as_ref()
            .map_or_else(|| format!("Product {product_id}"), |p| p.title.clone()),
        price: product
            .as_ref()
            .and_then(|p| p.discounted_price.or(p.actual_price)),
        image: product
            .and_then(|p| p.images.into_iter().next())
            .map(ImageDto::into_url),
    })
}

pub fn convert_geo<Id>(dto: GeoDto<Id>) -> GeoRef<Id> {
    GeoRef {
        id: dto.id,
        name: dto.name,
    }
}

/// Addresses with a pincode that fails validation are skipped.
pub fn convert_address(dto: AddressDto) -> Option<Address> {
    let pincode = match Pincode::parse(dto.pincode.trim()) {
        Ok(pincode) => pincode,
        Err(e) => {
            warn!(address_id = %dto.id, error = %e, "Skipping address with invalid pincode");
            return None;
        }
    };
    Some(Address {
        local_id: dto.id.to_string(),
        server_id: Some(dto.id),
        recipient_name: dto.recipient_name,
        contact: dto.contact,
        line1: dto.line1,
        line2: dto.line2.filter(|l| !l.trim().is_empty()),
        line3: dto.line3.filter(|l| !l.trim().is_empty()),
        landmark: dto.landmark.filter(|l| !l.trim().is_empty()),
        country: GeoRef {
            id: dto.country_id,
            name: dto.country_name.unwrap_or_default(),
        },
        state: GeoRef {
            id: dto.state_id,
            name: dto.state_name.unwrap_or_default(),
        },
        city: GeoRef {
            id: dto.city_id,
            name: dto.city_name.unwrap_or_default(),
        },
        pincode,
        is_default: dto.is_default.unwrap_or(false),
    })
}

pub fn convert_contact_type(dto: ContactTypeDto) -> ContactType {
    ContactType {
        id: dto.id,
        name: dto.name,
    }
}

pub fn convert_order_summary(dto: OrderSummaryDto) -> OrderSummary {
    OrderSummary {
        order_id: dto.order_id,
        placed_at: parse_timestamp(dto.created_at.as_deref()),
        status: dto.status.unwrap_or(OrderStatus::Pending),
        total: dto.total.unwrap_or(Decimal::ZERO),
        item_count: dto.item_count.unwrap_or(0),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn convert_order_item(dto: OrderItemDto) -> OrderItem {
    let product = dto.product;
    let quantity = if dto.quantity.is_finite() && dto.quantity >= 0.0 {
        dto.quantity.floor().min(f64::from(u32::MAX)) as u32
    } else {
        0
    };
    OrderItem {
        product_id: dto.product_id.or_else(|| product.as_ref().map(|p| p.id)),
        title: dto
            .title
            .or_else(|| product.as_ref().map(|p| p.title.clone()))
            .unwrap_or_default(),
        quantity,
        unit_price: dto
            .unit_price
            .or_else(|| {
                product
                    .as_ref()
                    .and_then(|p| p.discounted_price.or(p.actual_price))
            })
            .unwrap_or(Decimal::ZERO),
        image: dto
            .image
            .or_else(|| product.and_then(|p| p.images.into_iter().next()))
            .map(ImageDto::into_url),
    }
}

/// Subtotal is recomputed from the items; a missing total is derived.
pub fn convert_order_details(dto: OrderDetailsDto) -> OrderDetails {
    let items: Vec<OrderItem> = dto.items.into_iter().map(convert_order_item).collect();
    let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
    let delivery_charge = dto.delivery_charge.unwrap_or(Decimal::ZERO);
    OrderDetails {
        order_id: dto.order_id,
        placed_at: parse_timestamp(dto.created_at.as_deref()),
        status: dto.status.unwrap_or(OrderStatus::Pending),
        total: dto.total.unwrap_or(subtotal + delivery_charge),
        items,
        subtotal,
        delivery_charge,
        shipping_address: dto.shipping_address,
        tracking_url: dto.tracking_url,
    }
}
