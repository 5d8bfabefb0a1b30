//! Plain-text views.
//!
//! Every function returns the rendered text; printing happens in
//! [`crate::commands::emit`].

use rust_decimal::Decimal;

use craftmart_core::Money;
use craftmart_storefront::checkout::{CheckoutTotals, ServiceabilityEntry};
use craftmart_storefront::error::AppError;
use craftmart_storefront::models::{
    Address, Cart, Category, ContactType, OrderDetails, OrderSummary, Product, SavedItem,
};

fn money(amount: Decimal) -> String {
    Money::inr(amount).display()
}

// =============================================================================
// Catalog
// =============================================================================

/// One row per product: id, title, price and a stock marker.
pub fn product_grid(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products match these filters.".to_string();
    }
    products
        .iter()
        .map(|p| {
            let mut row = format!("#{:<6} {:<40} {:>10}", p.id.to_string(), p.title, money(p.price()));
            if let Some(actual) = p.actual_price
                && p.discounted_price.is_some_and(|d| d < actual)
            {
                row.push_str(&format!("  (was {})", money(actual)));
            }
            if !p.in_stock() {
                row.push_str("  [out of stock]");
            }
            row
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn product_detail(product: &Product) -> String {
    let mut lines = vec![
        product.title.clone(),
        format!("Price: {}", money(product.price())),
    ];
    if let Some(category) = &product.category {
        lines.push(format!("Category: {}", category.name));
    }
    lines.push(match product.stock {
        Some(0) => "Out of stock".to_string(),
        Some(n) => format!("{n} in stock"),
        None => "In stock".to_string(),
    });
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(String::new());
        lines.push(description.to_string());
    }
    for image in &product.images {
        lines.push(format!("Image: {image}"));
    }
    lines.join("\n")
}

pub fn categories(categories: &[Category]) -> String {
    let (roots, children): (Vec<&Category>, Vec<&Category>) =
        categories.iter().partition(|c| c.parent_id.is_none());
    let mut lines = Vec::new();
    for root in roots {
        lines.push(format!("#{:<5} {}", root.id.to_string(), root.name));
        for child in children.iter().filter(|c| c.parent_id == Some(root.id)) {
            lines.push(format!("  #{:<5} {}", child.id.to_string(), child.name));
        }
    }
    lines.join("\n")
}

// =============================================================================
// Cart
// =============================================================================

/// Cart lines, totals and the saved-for-later list.
pub fn cart(cart: &Cart, saved: &[SavedItem], totals: &CheckoutTotals) -> String {
    let mut lines = Vec::new();
    if cart.is_empty() {
        lines.push("Your cart is empty.".to_string());
    } else {
        lines.push(format!("Cart ({} items)", cart.item_count()));
        for line in cart.visible_lines() {
            let mut row = format!(
                "  [{}] {:<36} {:>3} x {:>9} = {:>10}",
                line.item_id.to_string(),
                line.title,
                line.quantity,
                money(line.unit_price()),
                money(line.line_total()),
            );
            if let Some(stock) = line.stock
                && line.quantity >= stock
            {
                row.push_str("  (max)");
            }
            lines.push(row);
        }
        lines.push(String::new());
        lines.push(checkout_summary(totals));
    }

    if !saved.is_empty() {
        lines.push(String::new());
        lines.push(saved_items(saved));
    }
    lines.join("\n")
}

pub fn saved_items(saved: &[SavedItem]) -> String {
    if saved.is_empty() {
        return "Nothing saved for later.".to_string();
    }
    let mut lines = vec![format!("Saved for later ({})", saved.len())];
    lines.extend(saved.iter().map(|item| {
        let price = item.price.map(money).unwrap_or_default();
        format!("  [{}] {:<36} {:>10}", item.saved_id.to_string(), item.title, price)
    }));
    lines.join("\n")
}

pub fn checkout_summary(totals: &CheckoutTotals) -> String {
    [
        format!("Subtotal:  {:>12}", money(totals.subtotal)),
        format!("Delivery:  {:>12}", money(totals.delivery_charge)),
        format!("Total:     {:>12}", money(totals.total)),
    ]
    .join("\n")
}

// =============================================================================
// Addresses
// =============================================================================

/// An address card with its selection marker and serviceability line.
pub fn address_card(
    address: &Address,
    selected: bool,
    serviceability: Option<&ServiceabilityEntry>,
) -> String {
    let marker = if selected { "(*)" } else { "( )" };
    let mut header = format!("{marker} {} [{}]", address.recipient_name, address.local_id);
    if address.is_default {
        header.push_str("  default");
    }
    if address.is_pending() {
        header.push_str("  saving…");
    }
    let status = match serviceability {
        None => "Delivery not checked yet".to_string(),
        Some(entry) if entry.checking => "Checking delivery…".to_string(),
        Some(entry) => match entry.prepaid {
            Some(true) => "Prepaid delivery available".to_string(),
            Some(false) => "We cannot deliver to this pincode yet".to_string(),
            None => entry
                .error
                .as_ref()
                .map_or_else(|| "Delivery status unknown".to_string(), |e| {
                    format!("Delivery status unknown ({e})")
                }),
        },
    };
    [
        header,
        format!("    {}", address.one_line()),
        format!("    Phone: {}", address.contact),
        format!("    {status}"),
    ]
    .join("\n")
}

// =============================================================================
// Orders and contact
// =============================================================================

pub fn order_list(orders: &[OrderSummary]) -> String {
    if orders.is_empty() {
        return "You have not placed any orders yet.".to_string();
    }
    orders
        .iter()
        .map(|o| {
            let placed = o
                .placed_at
                .map(|t| t.format("%d %b %Y").to_string())
                .unwrap_or_default();
            format!(
                "{:<16} {:<12} {:<10} {:>3} items {:>10}",
                o.order_id.as_str(),
                placed,
                o.status.label(),
                o.item_count,
                money(o.total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn order_details(order: &OrderDetails) -> String {
    let mut lines = vec![format!("Order {}  ({})", order.order_id, order.status)];
    if let Some(placed) = order.placed_at {
        lines.push(format!("Placed {}", placed.format("%d %b %Y %H:%M")));
    }
    lines.push(String::new());
    for item in &order.items {
        lines.push(format!(
            "  {:<36} {:>3} x {:>9} = {:>10}",
            item.title,
            item.quantity,
            money(item.unit_price),
            money(item.line_total())
        ));
    }
    lines.push(String::new());
    lines.push(checkout_summary(&CheckoutTotals {
        subtotal: order.subtotal,
        delivery_charge: order.delivery_charge,
        total: order.total,
    }));
    if let Some(address) = &order.shipping_address {
        lines.push(format!("Ship to: {address}"));
    }
    if let Some(url) = &order.tracking_url {
        lines.push(format!("Track: {url}"));
    }
    lines.join("\n")
}

pub fn contact_types(types: &[ContactType]) -> String {
    types
        .iter()
        .map(|t| format!("#{:<4} {}", t.id.to_string(), t.name))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Errors
// =============================================================================

/// User-facing rendering of an error, one line per invalid field.
pub fn error(err: &AppError) -> String {
    match err.field_errors() {
        Some(fields) => fields
            .iter()
            .map(|(field, message)| match field {
                craftmart_storefront::error::FormField::Form => message.to_string(),
                _ => format!("{field}: {message}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => err.user_message(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use craftmart_core::{CartItemId, CityId, CountryId, Pincode, ProductId, StateId};
    use craftmart_storefront::error::{FieldErrors, FormField};
    use craftmart_storefront::models::{CartLine, GeoRef};

    fn line(id: i64, title: &str, qty: u32, price: i64, stock: Option<u32>) -> CartLine {
        CartLine {
            item_id: CartItemId::new(id),
            product_id: ProductId::new(id + 100),
            title: title.to_string(),
            image: None,
            quantity: qty,
            actual_price: Some(Decimal::from(price)),
            discounted_price: None,
            in_use: true,
            stock,
        }
    }

    #[test]
    fn test_cart_view_shows_totals() {
        let cart = Cart {
            id: None,
            customer_id: None,
            lines: vec![line(1, "Kantha throw", 2, 100, Some(2)), line(2, "Clay cup", 1, 50, None)],
        };
        let totals = CheckoutTotals::compute(&cart, Decimal::from(70));
        let text = super::cart(&cart, &[], &totals);
        assert!(text.contains("Cart (3 items)"));
        assert!(text.contains("₹320"));
        assert!(text.contains("(max)"));
    }

    #[test]
    fn test_empty_cart() {
        let totals = CheckoutTotals::compute(&Cart::default(), Decimal::ZERO);
        assert_eq!(super::cart(&Cart::default(), &[], &totals), "Your cart is empty.");
    }

    #[test]
    fn test_address_card_serviceability() {
        let address = Address {
            local_id: "12".to_string(),
            server_id: None,
            recipient_name: "Meera".to_string(),
            contact: "9876543210".to_string(),
            line1: "4 Handloom Street".to_string(),
            line2: None,
            line3: None,
            landmark: None,
            country: GeoRef { id: CountryId::new(1), name: "India".to_string() },
            state: GeoRef { id: StateId::new(33), name: "Tamil Nadu".to_string() },
            city: GeoRef { id: CityId::new(7), name: "Madurai".to_string() },
            pincode: Pincode::parse("625001").unwrap(),
            is_default: true,
        };
        let blocked = ServiceabilityEntry {
            checking: false,
            prepaid: Some(false),
            error: None,
        };
        let text = address_card(&address, true, Some(&blocked));
        assert!(text.starts_with("(*) Meera"));
        assert!(text.contains("cannot deliver"));
        assert!(text.contains("625001"));
    }

    #[test]
    fn test_error_lists_fields() {
        let mut fields = FieldErrors::single(FormField::Pincode, "Enter a valid 6-digit pincode");
        fields.insert(FormField::Form, "Please fix the errors below");
        let text = error(&AppError::Validation(fields));
        assert_eq!(
            text,
            "pincode: Enter a valid 6-digit pincode\nPlease fix the errors below"
        );
    }
}
