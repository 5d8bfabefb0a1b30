//! Cart and saved-for-later models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craftmart_core::{CartId, CartItemId, CustomerId, ProductId, SavedItemId};

/// A line in the shopper's cart.
///
/// `actual_price`/`discounted_price` and `stock` are snapshots taken when the
/// line was added or last updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub title: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub actual_price: Option<Decimal>,
    pub discounted_price: Option<Decimal>,
    /// Lines with `in_use == false` are hidden and excluded from totals.
    pub in_use: bool,
    /// Known stock; `None` means unbounded.
    pub stock: Option<u32>,
}

impl CartLine {
    /// Price per unit: discounted, else actual, else zero.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.discounted_price
            .or(self.actual_price)
            .unwrap_or(Decimal::ZERO)
    }

    /// `quantity × unit_price`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price()
    }

    /// Force `quantity` into `[1, max(1, stock)]`.
    pub fn clamp_to_stock(&mut self) {
        self.quantity = clamp_quantity(f64::from(self.quantity), self.stock);
    }
}

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Server cart id; `None` until the first line is added.
    pub id: Option<CartId>,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Lines that are shown and counted.
    pub fn visible_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| line.in_use)
    }

    /// Σ quantity × unit price over visible lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.visible_lines().map(CartLine::line_total).sum()
    }

    /// Total units over visible lines, for the cart badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.visible_lines()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Returns `true` if there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible_lines().next().is_none()
    }

    /// Find a line by its item id.
    #[must_use]
    pub fn line(&self, item_id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }

    pub(crate) fn line_mut(&mut self, item_id: CartItemId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.item_id == item_id)
    }

    /// Remove a line, returning it if it was present.
    pub(crate) fn remove_line(&mut self, item_id: CartItemId) -> Option<CartLine> {
        let idx = self.lines.iter().position(|line| line.item_id == item_id)?;
        Some(self.lines.remove(idx))
    }
}

/// A product parked in the saved-for-later list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    pub saved_id: SavedItemId,
    pub product_id: ProductId,
    pub title: String,
    pub price: Option<Decimal>,
    pub image: Option<String>,
}

/// Clamp a requested quantity to `[1, max(1, stock)]` after flooring.
///
/// Unknown stock leaves the upper bound open. Non-finite requests (NaN) and
/// anything below one clamp to one.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn clamp_quantity(requested: f64, stock: Option<u32>) -> u32 {
    let upper = stock.map_or(u32::MAX, |s| s.max(1));
    if requested.is_nan() {
        return 1;
    }
    let floored = requested.floor();
    if floored <= 1.0 {
        1
    } else if floored >= f64::from(upper) {
        upper
    } else {
        // In (1, upper) so the cast is exact.
        floored as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, price: i64, qty: u32) -> CartLine {
        CartLine {
            item_id: CartItemId::new(id),
            product_id: ProductId::new(id * 10),
            title: format!("Item {id}"),
            image: None,
            quantity: qty,
            actual_price: Some(Decimal::from(price)),
            discounted_price: None,
            in_use: true,
            stock: None,
        }
    }

    #[test]
    fn test_clamp_with_known_stock() {
        assert_eq!(clamp_quantity(3.0, Some(5)), 3);
        assert_eq!(clamp_quantity(9.0, Some(5)), 5);
        assert_eq!(clamp_quantity(0.0, Some(5)), 1);
        assert_eq!(clamp_quantity(-4.0, Some(5)), 1);
        assert_eq!(clamp_quantity(4.9, Some(5)), 4);
    }

    #[test]
    fn test_clamp_zero_stock_still_allows_one() {
        assert_eq!(clamp_quantity(3.0, Some(0)), 1);
    }

    #[test]
    fn test_clamp_unknown_stock() {
        assert_eq!(clamp_quantity(250.0, None), 250);
        assert_eq!(clamp_quantity(0.5, None), 1);
        assert_eq!(clamp_quantity(f64::NAN, None), 1);
        assert_eq!(clamp_quantity(f64::INFINITY, None), u32::MAX);
    }

    #[test]
    fn test_clamp_matches_formula_over_grid() {
        for stock in 0..=6u32 {
            for tenths in -20..=90i32 {
                let q = f64::from(tenths) / 10.0;
                let expected = q.floor().clamp(1.0, f64::from(stock.max(1)));
                assert!(
                    (f64::from(clamp_quantity(q, Some(stock))) - expected).abs() < f64::EPSILON,
                    "q={q} stock={stock}"
                );
            }
        }
    }

    #[test]
    fn test_unit_price_prefers_discount() {
        let mut l = line(1, 100, 1);
        assert_eq!(l.unit_price(), Decimal::from(100));
        l.discounted_price = Some(Decimal::from(80));
        assert_eq!(l.unit_price(), Decimal::from(80));
        l.discounted_price = None;
        l.actual_price = None;
        assert_eq!(l.unit_price(), Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_excludes_unused_lines() {
        let mut hidden = line(3, 999, 4);
        hidden.in_use = false;
        let cart = Cart {
            id: Some(CartId::new(1)),
            customer_id: None,
            lines: vec![line(1, 100, 2), line(2, 50, 1), hidden],
        };
        assert_eq!(cart.subtotal(), Decimal::from(250));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.visible_lines().count(), 2);
    }

    #[test]
    fn test_remove_line() {
        let mut cart = Cart {
            lines: vec![line(1, 100, 1), line(2, 50, 1)],
            ..Cart::default()
        };
        assert!(cart.remove_line(CartItemId::new(1)).is_some());
        assert!(cart.remove_line(CartItemId::new(1)).is_none());
        assert_eq!(cart.lines.len(), 1);
    }
}
