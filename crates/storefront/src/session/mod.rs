//! Local persistence of the shopper's session.
//!
//! A [`LocalStorage`] backend holds plain string entries under fixed keys
//! (the same keys the web storefront kept in browser storage). [`Session`]
//! is the typed facade the rest of the crate uses; nothing else touches the
//! raw keys.

mod storage;

pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use craftmart_core::CustomerId;

use crate::models::Address;

/// Storage keys for session data.
pub mod keys {
    /// Bearer token attached to authenticated requests.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Token exchanged for a new access token after a 401.
    pub const REFRESH_TOKEN: &str = "refreshToken";

    /// Signed-in customer id.
    pub const CUSTOMER_ID: &str = "customerId";

    /// Username pre-filled on the login form.
    pub const REMEMBERED_USER: &str = "rememberedUser";

    /// JSON-serialized address list shown before the server list arrives.
    pub const ADDRESSES: &str = "addresses";

    /// Cart badge count.
    pub const CART_COUNT: &str = "cartCount";
}

/// Tokens returned by login and token refresh.
#[derive(Clone)]
pub struct AuthTokens {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Typed view over local storage.
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn LocalStorage>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("customer_id", &self.customer_id())
            .finish()
    }
}

impl Session {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Session backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Current access token, if signed in.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.storage.get(keys::ACCESS_TOKEN).map(SecretString::from)
    }

    /// Current refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.storage.get(keys::REFRESH_TOKEN).map(SecretString::from)
    }

    /// Persist tokens. A missing refresh token keeps the previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), StorageError> {
        self.storage
            .set(keys::ACCESS_TOKEN, tokens.access_token.expose_secret())?;
        if let Some(refresh) = &tokens.refresh_token {
            self.storage.set(keys::REFRESH_TOKEN, refresh.expose_secret())?;
        }
        Ok(())
    }

    /// Signed-in customer id.
    #[must_use]
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.storage
            .get(keys::CUSTOMER_ID)
            .and_then(|raw| raw.parse().ok())
    }

    /// Persist the signed-in customer id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn set_customer_id(&self, id: CustomerId) -> Result<(), StorageError> {
        self.storage.set(keys::CUSTOMER_ID, &id.to_string())
    }

    /// Returns `true` when an access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.storage.get(keys::ACCESS_TOKEN).is_some()
    }

    /// Remove tokens, customer id and per-customer caches.
    ///
    /// The remembered username survives sign-out.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear_auth(&self) -> Result<(), StorageError> {
        for key in [
            keys::ACCESS_TOKEN,
            keys::REFRESH_TOKEN,
            keys::CUSTOMER_ID,
            keys::ADDRESSES,
            keys::CART_COUNT,
        ] {
            self.storage.remove(key)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Login form
    // ─────────────────────────────────────────────────────────────────────────

    /// Username to pre-fill on the login form.
    #[must_use]
    pub fn remembered_user(&self) -> Option<String> {
        self.storage.get(keys::REMEMBERED_USER)
    }

    /// Remember `username`, or forget it when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn remember_user(&self, username: Option<&str>) -> Result<(), StorageError> {
        match username {
            Some(name) => self.storage.set(keys::REMEMBERED_USER, name),
            None => self.storage.remove(keys::REMEMBERED_USER),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Caches
    // ─────────────────────────────────────────────────────────────────────────

    /// Address list cached from the last successful fetch.
    ///
    /// A corrupt cache entry reads as empty.
    #[must_use]
    pub fn cached_addresses(&self) -> Vec<Address> {
        self.storage
            .get(keys::ADDRESSES)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable address cache");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Replace the cached address list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be serialized or written.
    pub fn cache_addresses(&self, addresses: &[Address]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(addresses)?;
        self.storage.set(keys::ADDRESSES, &raw)
    }

    /// Cart badge count.
    #[must_use]
    pub fn cart_count(&self) -> u32 {
        self.storage
            .get(keys::CART_COUNT)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Update the cart badge count.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn set_cart_count(&self, count: u32) -> Result<(), StorageError> {
        self.storage.set(keys::CART_COUNT, &count.to_string())
    }
}
