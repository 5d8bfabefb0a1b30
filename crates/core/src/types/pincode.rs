//! Indian postal code (PIN) type.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`Pincode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PincodeError {
    /// The input is not exactly six characters.
    #[error("pincode must be exactly {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
    /// The input contains a non-digit character.
    #[error("pincode must contain only digits")]
    NonDigit,
    /// The first digit is zero.
    #[error("pincode cannot start with 0")]
    LeadingZero,
}

/// A six-digit Indian postal code.
///
/// Matches `^[1-9][0-9]{5}$`: exactly six ASCII digits, the first non-zero.
/// Surrounding whitespace is not trimmed; `" 400001"` is rejected.
///
/// ```
/// use craftmart_core::Pincode;
///
/// assert!(Pincode::parse("400001").is_ok());
/// assert!(Pincode::parse("000001").is_err());
/// assert!(Pincode::parse("40001").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Pincode(String);

impl Pincode {
    /// Number of digits in a pincode.
    pub const LENGTH: usize = 6;

    /// Parse a `Pincode` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not six digits or starts with `0`.
    pub fn parse(s: &str) -> Result<Self, PincodeError> {
        if s.len() != Self::LENGTH {
            return Err(PincodeError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PincodeError::NonDigit);
        }
        if s.starts_with('0') {
            return Err(PincodeError::LeadingZero);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the pincode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` iff `s` is a valid six-digit Indian pincode.
#[must_use]
pub fn is_valid_indian_pincode(s: &str) -> bool {
    Pincode::parse(s).is_ok()
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Pincode {
    type Err = PincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Pincode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Pincode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Some address payloads carry the pincode as a number.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        Self::parse(text.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pincodes() {
        assert!(is_valid_indian_pincode("400001"));
        assert!(is_valid_indian_pincode("110001"));
        assert!(is_valid_indian_pincode("999999"));
    }

    #[test]
    fn test_leading_zero_rejected() {
        assert!(!is_valid_indian_pincode("000001"));
        assert_eq!(Pincode::parse("012345"), Err(PincodeError::LeadingZero));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!is_valid_indian_pincode("40001"));
        assert!(!is_valid_indian_pincode("4000011"));
        assert!(!is_valid_indian_pincode(""));
    }

    #[test]
    fn test_non_digit_rejected() {
        assert_eq!(Pincode::parse("40a001"), Err(PincodeError::NonDigit));
        assert!(!is_valid_indian_pincode(" 40001"));
        assert_eq!(Pincode::parse("40 001"), Err(PincodeError::NonDigit));
        assert!(!is_valid_indian_pincode("४०००१"));
    }

    #[test]
    fn test_deserialize_from_number_or_string() {
        let a: Pincode = serde_json::from_str("560001").unwrap();
        let b: Pincode = serde_json::from_str("\"560001\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Pincode>("\"060001\"").is_err());
    }

    #[test]
    fn test_exhaustive_against_pattern() {
        // Spot-check the boundary of every leading digit.
        for lead in 0..=9u8 {
            let code = format!("{lead}00000");
            assert_eq!(is_valid_indian_pincode(&code), lead != 0, "{code}");
        }
    }
}
