//! Status enums for backend acknowledgements and orders.

use serde::{Deserialize, Deserializer, Serialize};

/// Backend acknowledgement carried in every response envelope (`ack`).
///
/// The backend is not consistent about casing (`"success"`, `"Success"`,
/// `"SUCCESS"`), so parsing is case-insensitive. Anything that is not a
/// success or failure is kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
    Success,
    Failure,
    Other(String),
}

impl Ack {
    /// Parse an acknowledgement string, ignoring case and surrounding space.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("success") {
            Self::Success
        } else if trimmed.eq_ignore_ascii_case("failure") {
            Self::Failure
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    /// Returns `true` for a success acknowledgement.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<'de> Deserialize<'de> for Ack {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Lifecycle status of a sell order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Unknown(String),
}

impl OrderStatus {
    /// Parse a backend status label such as `"SHIPPED"` or `"In Transit"`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" | "placed" | "created" => Self::Pending,
            "confirmed" | "accepted" => Self::Confirmed,
            "packed" | "ready_to_ship" => Self::Packed,
            "shipped" | "in_transit" | "dispatched" => Self::Shipped,
            "delivered" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            "returned" | "rto" => Self::Returned,
            _ => Self::Unknown(s.trim().to_string()),
        }
    }

    /// Human-readable label for order listings.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Packed => "Packed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
            Self::Unknown(raw) => raw,
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
