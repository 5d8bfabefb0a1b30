//! Unified error handling.
//!
//! Every failure in the storefront degrades to a user-visible message; none
//! is fatal. [`AppError::user_message`] is the single place that maps the
//! error taxonomy (auth, validation, server-rejected, network) to text.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::session::StorageError;

/// Generic banner for network and parse failures.
pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the server. Please try again.";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Local storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Client-side validation failed; no request was issued.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Cart operation was refused.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout was blocked.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation was cancelled before it completed.
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Storage(_) => "Could not save your session on this device.".to_string(),
            Self::Validation(fields) => fields.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} was not found."),
            Self::Cancelled => "Request cancelled.".to_string(),
        }
    }

    /// Returns `true` if the shopper must sign in again.
    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::AuthRequired) | Self::Checkout(CheckoutError::SignedOut)
        )
    }

    /// Field-level messages, if this is a validation failure.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(fields: FieldErrors) -> Self {
        Self::Validation(fields)
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Form fields
// =============================================================================

/// Form inputs that can carry an inline error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    Username,
    Password,
    FirstName,
    LastName,
    Email,
    Phone,
    CurrentPassword,
    NewPassword,
    ConfirmPassword,
    RecipientName,
    Contact,
    AddressLine1,
    Country,
    State,
    City,
    Pincode,
    ContactType,
    Message,
    Captcha,
    /// Not tied to one input; shown as a banner above the form.
    Form,
}

impl FormField {
    /// Stable snake_case name used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::CurrentPassword => "current_password",
            Self::NewPassword => "new_password",
            Self::ConfirmPassword => "confirm_password",
            Self::RecipientName => "recipient_name",
            Self::Contact => "contact",
            Self::AddressLine1 => "address_line1",
            Self::Country => "country",
            Self::State => "state",
            Self::City => "city",
            Self::Pincode => "pincode",
            Self::ContactType => "contact_type",
            Self::Message => "message",
            Self::Captcha => "captcha",
            Self::Form => "form",
        }
    }

    const ALL: [Self; 20] = [
        Self::Username,
        Self::Password,
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Phone,
        Self::CurrentPassword,
        Self::NewPassword,
        Self::ConfirmPassword,
        Self::RecipientName,
        Self::Contact,
        Self::AddressLine1,
        Self::Country,
        Self::State,
        Self::City,
        Self::Pincode,
        Self::ContactType,
        Self::Message,
        Self::Captcha,
        Self::Form,
    ];
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown form field: {s}"))
    }
}

/// Inline validation messages keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<FormField, String>);

impl FieldErrors {
    /// Create an empty set of field errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error attached to one field.
    #[must_use]
    pub fn single(field: FormField, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    /// Record a message for `field`. The first message for a field wins.
    pub fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Record `message` for `field` if `condition` holds.
    pub fn check(&mut self, condition: bool, field: FormField, message: impl Into<String>) {
        if condition {
            self.insert(field, message);
        }
    }

    /// Message for `field`, if any.
    #[must_use]
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Returns `true` if no field has an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    /// `Ok(())` when empty, otherwise `Err(AppError::Validation)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when at least one field failed.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| match field {
                FormField::Form => msg.clone(),
                _ => format!("{field}: {msg}"),
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}
