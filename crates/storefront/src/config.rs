//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_BASE` - Backend API origin (falls back to `NEXT_PUBLIC_API_BASE`)
//!
//! ## Optional
//! - `STOREFRONT_RECAPTCHA_SITE_KEY` - reCAPTCHA site key (falls back to `NEXT_PUBLIC_RECAPTCHA_SITE_KEY`)
//! - `STOREFRONT_STATE_PATH` - Local storage file (default: `$HOME/.craftmart/storage.json`)
//! - `STOREFRONT_DEFAULT_DELIVERY_CHARGE` - Charge used when the lookup fails (default: 70)
//! - `STOREFRONT_DUPLICATE_SAVED_CODE` - Backend code for an already-saved product (default: 1003)
//! - `STOREFRONT_PASSWORD_ERROR_FIELDS` - `code:field` pairs for password-change errors
//! - `STOREFRONT_CATALOG_CACHE_TTL_SECS` - Catalog and master data cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use crate::error::FormField;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API origin, e.g. `https://api.example.in`
    pub api_base: Url,
    /// reCAPTCHA site key forwarded to forms that require a captcha token
    pub recaptcha_site_key: Option<String>,
    /// Path of the JSON file backing local storage
    pub state_path: PathBuf,
    /// Checkout tuning
    pub checkout: CheckoutConfig,
    /// Backend error-code tables
    pub error_codes: ErrorCodeConfig,
    /// TTL for cached catalog and master data
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Delivery charge shown when the lookup for a pincode fails.
    pub default_delivery_charge: Decimal,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            default_delivery_charge: Decimal::from(DEFAULT_DELIVERY_CHARGE),
        }
    }
}

/// Backend-specific error codes.
///
/// These mirror literals the backend is known to emit; their completeness
/// cannot be verified from the client, so they are configuration.
#[derive(Debug, Clone)]
pub struct ErrorCodeConfig {
    /// Code returned when a product is already in the saved list.
    pub duplicate_saved: i64,
    /// Password-change error codes mapped to the form field they concern.
    pub password_fields: HashMap<i64, FormField>,
}

impl Default for ErrorCodeConfig {
    fn default() -> Self {
        Self {
            duplicate_saved: DEFAULT_DUPLICATE_SAVED_CODE,
            password_fields: default_password_fields(),
        }
    }
}

const DEFAULT_DELIVERY_CHARGE: i64 = 70;
const DEFAULT_DUPLICATE_SAVED_CODE: i64 = 1003;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

fn default_password_fields() -> HashMap<i64, FormField> {
    HashMap::from([
        (1018, FormField::CurrentPassword),
        (1019, FormField::NewPassword),
        (1020, FormField::NewPassword),
        (1021, FormField::ConfirmPassword),
        (1022, FormField::CurrentPassword),
    ])
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_raw = get_optional_env("STOREFRONT_API_BASE")
            .or_else(|| get_optional_env("NEXT_PUBLIC_API_BASE"))
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_API_BASE".to_string()))?;
        let api_base = parse_api_base(&api_base_raw)?;

        let recaptcha_site_key = get_optional_env("STOREFRONT_RECAPTCHA_SITE_KEY")
            .or_else(|| get_optional_env("NEXT_PUBLIC_RECAPTCHA_SITE_KEY"));

        let state_path = get_optional_env("STOREFRONT_STATE_PATH")
            .map_or_else(default_state_path, PathBuf::from);

        let default_delivery_charge = get_parsed_or_default(
            "STOREFRONT_DEFAULT_DELIVERY_CHARGE",
            Decimal::from(DEFAULT_DELIVERY_CHARGE),
        )?;

        let duplicate_saved =
            get_parsed_or_default("STOREFRONT_DUPLICATE_SAVED_CODE", DEFAULT_DUPLICATE_SAVED_CODE)?;

        let password_fields = match get_optional_env("STOREFRONT_PASSWORD_ERROR_FIELDS") {
            Some(raw) => parse_code_fields(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PASSWORD_ERROR_FIELDS".to_string(), e)
            })?,
            None => default_password_fields(),
        };

        let ttl_secs = get_parsed_or_default(
            "STOREFRONT_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?;

        Ok(Self {
            api_base,
            recaptcha_site_key,
            state_path,
            checkout: CheckoutConfig {
                default_delivery_charge,
            },
            error_codes: ErrorCodeConfig {
                duplicate_saved,
                password_fields,
            },
            catalog_cache_ttl: Duration::from_secs(ttl_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Configuration pointing at `api_base` with every optional value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_base` is not an absolute URL.
    pub fn for_api_base(api_base: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: parse_api_base(api_base)?,
            recaptcha_site_key: None,
            state_path: default_state_path(),
            checkout: CheckoutConfig::default(),
            error_codes: ErrorCodeConfig::default(),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            sentry_dsn: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API origin, normalizing it to end with `/` so relative joins keep
/// any path prefix (e.g. `https://host/api/`).
fn parse_api_base(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_API_BASE".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_API_BASE".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Parse `1018:current_password,1021:confirm_password` into a code table.
fn parse_code_fields(raw: &str) -> Result<HashMap<i64, FormField>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (code, field) = pair
                .split_once(':')
                .ok_or_else(|| format!("expected code:field, got {pair:?}"))?;
            let code = code
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("invalid code {code:?}: {e}"))?;
            let field = field.trim().parse::<FormField>()?;
            Ok((code, field))
        })
        .collect()
}

fn default_state_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".craftmart")
        .join("storage.json")
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get and parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
