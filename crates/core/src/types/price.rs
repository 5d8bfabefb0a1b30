//! Type-safe money representation using decimal arithmetic.
//!
//! Amounts are carried as [`Decimal`] end to end; formatting happens only at
//! display time and rounds to two decimal places.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create an amount in the store currency (INR).
    #[must_use]
    pub const fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Zero in the store currency.
    #[must_use]
    pub const fn zero() -> Self {
        Self::inr(Decimal::ZERO)
    }

    /// Format for display, e.g. `₹1,23,456.50` or `₹320`.
    ///
    /// Whole amounts drop the fractional part; INR uses lakh grouping.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let abs = rounded.abs();
        let whole = abs.trunc();
        let fraction = abs - whole;

        let grouped = match self.currency_code {
            CurrencyCode::INR => group_indian(&whole.to_string()),
            CurrencyCode::USD | CurrencyCode::EUR | CurrencyCode::GBP => {
                group_thousands(&whole.to_string())
            }
        };

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(self.currency_code.symbol());
        out.push_str(&grouped);
        if !fraction.is_zero() {
            let cents = (fraction * Decimal::ONE_HUNDRED).trunc();
            out.push_str(&format!(".{cents:0>2}"));
        }
        out
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Group digits as `12,34,567` (last three, then pairs).
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

/// Group digits as `1,234,567`.
fn group_thousands(digits: &str) -> String {
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = digits;
    while rest.len() > 3 {
        let (front, triple) = rest.split_at(rest.len() - 3);
        groups.push(triple);
        rest = front;
    }
    groups.push(rest);
    groups.reverse();
    groups.join(",")
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}
