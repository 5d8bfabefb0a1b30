//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! The backend is inconsistent about id encoding (`12` vs `"12"`), so the
//! generated `Deserialize` accepts both and always serializes as a number.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Wire representation accepted for numeric ids.
#[derive(Deserialize)]
#[serde(untagged)]
#[doc(hidden)]
pub enum RawNumericId {
    Number(i64),
    Text(String),
}

impl RawNumericId {
    /// Resolve the raw value to an `i64`.
    ///
    /// # Errors
    ///
    /// Returns a message if the text form is not an integer.
    pub fn resolve(self) -> Result<i64, String> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid numeric id: {s:?}")),
        }
    }
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize` as a plain number, `Deserialize` from a number or numeric string
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use craftmart_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::new(1);
/// let gadget = GadgetId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: WidgetId = gadget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let raw = <$crate::types::id::RawNumericId as ::serde::Deserialize>::deserialize(
                    deserializer,
                )?;
                raw.resolve()
                    .map(Self)
                    .map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}

define_id!(CustomerId);
define_id!(CartId);
define_id!(CartItemId);
define_id!(ProductId);
define_id!(SavedItemId);
define_id!(AddressId);
define_id!(CategoryId);
define_id!(CountryId);
define_id!(StateId);
define_id!(CityId);
define_id!(ContactTypeId);

/// Order identifier as issued by the backend.
///
/// Order ids are opaque references (`"SO-2024-0012"` or `12`), so unlike the
/// numeric ids this keeps the text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create an order id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the order id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawNumericId::deserialize(deserializer)? {
            RawNumericId::Number(n) => Ok(Self(n.to_string())),
            RawNumericId::Text(s) => Ok(Self(s)),
        }
    }
}
