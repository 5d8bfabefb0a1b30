//! Backend REST API client.
//!
//! # Architecture
//!
//! - One `reqwest::Client` shared by every module through [`ApiClient`]
//! - The backend is the source of truth; nothing here persists business data
//! - Bearer auth with a single silent refresh on expired tokens
//! - Every endpoint decodes through a typed [`Envelope`] at this boundary
//! - In-memory caching via `moka` for catalog and master data
//!
//! # Example
//!
//! ```rust,ignore
//! use craftmart_storefront::api::{ApiClient, endpoints};
//!
//! let client = ApiClient::new(&config, session, events)?;
//! let countries: Vec<CountryDto> = client.get_data(&endpoints::countries()).await?;
//! ```

pub(crate) mod cache;
mod client;
pub(crate) mod conversions;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
pub use types::{Envelope, ErrorBody};

use thiserror::Error;

use crate::error::UNREACHABLE_MESSAGE;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The shopper must sign in again. Stored credentials have been cleared.
    #[error("Authentication required")]
    AuthRequired,

    /// Non-success HTTP status. `body` keeps the parsed reply, if any.
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        body: Option<Box<serde_json::Value>>,
    },

    /// The backend answered `ack: "failure"`.
    #[error("Request rejected{}: {message}", format_code(*.code))]
    Rejected { code: Option<i64>, message: String },

    /// A response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A response that must carry data had none.
    #[error("Empty response body")]
    EmptyBody,

    /// An endpoint path could not be joined onto the API base.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

fn format_code(code: Option<i64>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl ApiError {
    /// Backend error code, when the response carried one.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } | Self::Rejected { code, .. } => *code,
            _ => None,
        }
    }

    /// Parsed body of a non-success reply.
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Api { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Backend-provided message for server-rejected requests.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } | Self::Rejected { message, .. } if !message.is_empty() => {
                Some(message)
            }
            _ => None,
        }
    }

    /// Returns `true` for failures where the server never gave a usable answer.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_) | Self::EmptyBody)
    }

    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Your session has expired. Please sign in again.".to_string(),
            Self::Api { .. } | Self::Rejected { .. } => self
                .server_message()
                .map_or_else(|| "Something went wrong. Please try again.".to_string(), str::to_string),
            Self::Http(_) | Self::Parse(_) | Self::EmptyBody | Self::Url(_) => {
                UNREACHABLE_MESSAGE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Rejected {
            code: Some(1003),
            message: "Already saved".to_string(),
        };
        assert_eq!(err.to_string(), "Request rejected (1003): Already saved");

        let err = ApiError::Rejected {
            code: None,
            message: "Nope".to_string(),
        };
        assert_eq!(err.to_string(), "Request rejected: Nope");
    }

    #[test]
    fn test_code_and_message() {
        let err = ApiError::Api {
            status: 422,
            code: Some(1019),
            message: "New password must differ".to_string(),
            body: None,
        };
        assert_eq!(err.code(), Some(1019));
        assert_eq!(err.user_message(), "New password must differ");
        assert!(!err.is_network());
    }

    #[test]
    fn test_empty_server_message_falls_back() {
        let err = ApiError::Api {
            status: 500,
            code: None,
            message: String::new(),
            body: None,
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }

    #[test]
    fn test_network_errors() {
        assert!(ApiError::EmptyBody.is_network());
        assert_eq!(ApiError::EmptyBody.user_message(), UNREACHABLE_MESSAGE);
    }
}
