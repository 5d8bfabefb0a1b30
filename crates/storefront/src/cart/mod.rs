//! Cart reconciliation.
//!
//! Two copies of the cart are held: `confirmed` (the last server response)
//! and `local` (what the shopper sees, patched optimistically). Every server
//! round trip ends with both copies identical, either because the request
//! succeeded and `confirmed` caught up, or because it failed and both were
//! overwritten by a fresh fetch.
//!
//! Quantity edits are serialized through a single "saving line" slot: while
//! one line's update is outstanding, no other quantity change is submitted.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use craftmart_core::{CartId, CartItemId, CustomerId, ProductId, SavedItemId};

use crate::api::conversions::{convert_cart, convert_saved_item};
use crate::api::endpoints;
use crate::api::types::{
    AddToCartRequest, CartDto, DeleteSavedRequest, MoveToCartRequest, SaveProductRequest,
    SavedProductDto, UpdateQuantityRequest,
};
use crate::api::{ApiClient, ApiError};
use crate::config::ErrorCodeConfig;
use crate::error::{AppError, Result};
use crate::events::StoreEvent;
use crate::models::{Cart, CartLine, SavedItem, clamp_quantity};
use crate::optimistic::optimistic_mutation;

/// Reasons a cart operation is refused before or after reaching the server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Please sign in to use your cart")]
    SignedOut,

    #[error("Please wait for the current change to finish")]
    UpdateInFlight { line: CartItemId },

    #[error("That item is no longer in your cart")]
    LineNotFound(CartItemId),

    #[error("That item is no longer in your saved list")]
    SavedNotFound(SavedItemId),

    #[error("This product is already in your saved list")]
    AlreadySaved,
}

/// A removal the shopper still has to confirm.
///
/// Only [`CartManager::request_removal`] creates one and
/// [`CartManager::confirm_removal`] consumes it, so no delete request can be
/// issued without the confirmation step.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingRemoval {
    item_id: CartItemId,
    title: String,
}

impl PendingRemoval {
    #[must_use]
    pub const fn item_id(&self) -> CartItemId {
        self.item_id
    }

    /// Product title for the confirmation prompt.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Clears the saving-line slot when the update finishes, however it ends.
#[derive(Debug)]
struct SavingLine<'a> {
    slot: &'a Mutex<Option<CartItemId>>,
}

impl<'a> SavingLine<'a> {
    fn acquire(slot: &'a Mutex<Option<CartItemId>>, line: CartItemId) -> Result<Self> {
        let mut current = slot.lock();
        if let Some(busy) = *current {
            return Err(CartError::UpdateInFlight { line: busy }.into());
        }
        *current = Some(line);
        Ok(Self { slot })
    }
}

impl Drop for SavingLine<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

// =============================================================================
// CartManager
// =============================================================================

/// Optimistic cart and saved-for-later state for the signed-in shopper.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: ApiClient,
    codes: ErrorCodeConfig,
    confirmed: Mutex<Cart>,
    local: Mutex<Cart>,
    saved: Mutex<Vec<SavedItem>>,
    saving_line: Mutex<Option<CartItemId>>,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("lines", &self.inner.local.lock().lines.len())
            .field("saved", &self.inner.saved.lock().len())
            .field("saving_line", &*self.inner.saving_line.lock())
            .finish()
    }
}

impl CartManager {
    #[must_use]
    pub fn new(api: ApiClient, codes: ErrorCodeConfig) -> Self {
        Self {
            inner: Arc::new(CartInner {
                api,
                codes,
                confirmed: Mutex::new(Cart::default()),
                local: Mutex::new(Cart::default()),
                saved: Mutex::new(Vec::new()),
                saving_line: Mutex::new(None),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// The cart as shown to the shopper.
    #[must_use]
    pub fn local(&self) -> Cart {
        self.inner.local.lock().clone()
    }

    /// The cart as last confirmed by the server.
    #[must_use]
    pub fn confirmed(&self) -> Cart {
        self.inner.confirmed.lock().clone()
    }

    #[must_use]
    pub fn saved_items(&self) -> Vec<SavedItem> {
        self.inner.saved.lock().clone()
    }

    /// Line whose quantity update is outstanding. Quantity controls for
    /// every line are disabled while this is set.
    #[must_use]
    pub fn saving_line(&self) -> Option<CartItemId> {
        *self.inner.saving_line.lock()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.api.session().is_authenticated()
    }

    fn customer_id(&self) -> Result<CustomerId> {
        let session = self.inner.api.session();
        match session.customer_id() {
            Some(id) if session.is_authenticated() => Ok(id),
            _ => Err(CartError::SignedOut.into()),
        }
    }

    fn local_line(&self, item_id: CartItemId) -> Result<CartLine> {
        self.inner
            .local
            .lock()
            .line(item_id)
            .cloned()
            .ok_or_else(|| CartError::LineNotFound(item_id).into())
    }

    fn cart_id(&self) -> Option<CartId> {
        self.inner.local.lock().id
    }

    /// Replace both copies and publish the new badge count.
    fn install(&self, cart: Cart) {
        *self.inner.confirmed.lock() = cart.clone();
        let count = cart.item_count();
        *self.inner.local.lock() = cart;
        self.publish_count(count);
    }

    fn publish_count(&self, count: u32) {
        if let Err(e) = self.inner.api.session().set_cart_count(count) {
            warn!(error = %e, "Failed to persist cart count");
        }
        self.inner.api.events().publish(StoreEvent::CartChanged { count });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fetching
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the server cart and make it the local state.
    ///
    /// Lines are clamped into `[1, stock]`. A signed-out shopper gets an
    /// empty cart, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Cart> {
        if self.customer_id().is_err() {
            debug!("Signed out, showing empty cart");
            self.install(Cart::default());
            return Ok(Cart::default());
        }

        let dto: Option<CartDto> = self.inner.api.get_optional(endpoints::CART).await?;
        let cart = dto.map(convert_cart).unwrap_or_default();
        debug!(lines = cart.lines.len(), "Cart fetched");
        self.install(cart.clone());
        Ok(cart)
    }

    /// Load the saved-for-later list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch_saved_items(&self) -> Result<Vec<SavedItem>> {
        let Ok(customer) = self.customer_id() else {
            self.inner.saved.lock().clear();
            return Ok(Vec::new());
        };

        let dtos: Option<Vec<SavedProductDto>> = self
            .inner
            .api
            .get_optional(&endpoints::saved_products(customer))
            .await?;
        let items: Vec<SavedItem> = dtos
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_saved_item)
            .collect();
        (*self.inner.saved.lock()).clone_from(&items);
        Ok(items)
    }

    /// Fetch cart and saved list together.
    ///
    /// # Errors
    ///
    /// Returns the first error if either fetch fails.
    pub async fn refresh_all(&self) -> Result<()> {
        let (cart, saved) = tokio::join!(self.fetch_cart(), self.fetch_saved_items());
        cart?;
        saved?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `quantity` of a product; the server creates the cart on first add.
    ///
    /// # Errors
    ///
    /// Returns an error if signed out or the backend rejects the add.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<Cart> {
        let customer_id = self.customer_id()?;
        let request = AddToCartRequest {
            customer_id,
            product_id,
            quantity: clamp_quantity(f64::from(quantity), None),
        };
        ApiClient::expect_ack(self.inner.api.post(endpoints::CART, &request).await?)?;
        info!("Added to cart");
        self.fetch_cart().await
    }

    /// Change a line's quantity.
    ///
    /// The request is clamped against the line's stock snapshot and shown
    /// immediately. On failure the cart is re-fetched and the error returned.
    /// Returns the quantity that was applied.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UpdateInFlight` without any request while another
    /// line is saving, or the server error after reconciling.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn change_quantity(&self, item_id: CartItemId, requested: f64) -> Result<u32> {
        self.customer_id()?;
        let _saving = SavingLine::acquire(&self.inner.saving_line, item_id)?;

        let line = self.local_line(item_id)?;
        let quantity = clamp_quantity(requested, line.stock);
        let confirmed_qty = self.inner.confirmed.lock().line(item_id).map(|l| l.quantity);
        if confirmed_qty == Some(quantity) {
            // Nothing to send; just undo any stray local edit.
            if let Some(local) = self.inner.local.lock().line_mut(item_id) {
                local.quantity = quantity;
            }
            return Ok(quantity);
        }

        let Some(cart_id) = self.cart_id() else {
            return Err(CartError::LineNotFound(item_id).into());
        };
        let path = endpoints::cart_item(cart_id, item_id);
        let api = &self.inner.api;

        optimistic_mutation(
            &self.inner.local,
            |cart| {
                if let Some(local) = cart.line_mut(item_id) {
                    local.quantity = quantity;
                }
            },
            async {
                let body = api.put(&path, &UpdateQuantityRequest { quantity }).await?;
                ApiClient::expect_ack(body).map_err(AppError::from)
            },
            || async { self.fetch_cart().await.map(|_| ()) },
        )
        .await?;

        if let Some(confirmed) = self.inner.confirmed.lock().line_mut(item_id) {
            confirmed.quantity = quantity;
        }
        let count = self.inner.local.lock().item_count();
        self.publish_count(count);
        debug!(quantity, "Quantity saved");
        Ok(quantity)
    }

    /// Move a cart line to the saved-for-later list.
    ///
    /// The line leaves both cart copies immediately. If the backend reports
    /// the product as already saved, or rejects the request for any other
    /// reason, both lists are re-fetched rather than trusting the edit.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AlreadySaved` for the duplicate code, otherwise
    /// the server error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn save_for_later(&self, item_id: CartItemId) -> Result<()> {
        let customer = self.customer_id()?;
        let line = self.local_line(item_id)?;
        let api = &self.inner.api;
        let path = endpoints::saved_products(customer);
        let duplicate_code = self.inner.codes.duplicate_saved;

        self.inner.confirmed.lock().remove_line(item_id);
        let result = optimistic_mutation(
            &self.inner.local,
            |cart| {
                cart.remove_line(item_id);
            },
            async {
                let request = SaveProductRequest {
                    product_id: line.product_id,
                    cart_item_id: Some(item_id),
                };
                let body = api.post(&path, &request).await?;
                ApiClient::expect_ack(body).map_err(AppError::from)
            },
            || self.refresh_all(),
        )
        .await;

        match result {
            Ok(()) => {
                let count = self.inner.local.lock().item_count();
                self.publish_count(count);
                if let Err(e) = self.fetch_saved_items().await {
                    warn!(error = %e, "Saved list refresh failed after save-for-later");
                }
                info!("Saved for later");
                Ok(())
            }
            Err(AppError::Api(err)) if err.code() == Some(duplicate_code) => {
                debug!("Product was already saved");
                Err(CartError::AlreadySaved.into())
            }
            Err(err) => Err(err),
        }
    }

    /// Move a saved item back into the cart, then refresh both lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown or the backend rejects it.
    #[instrument(skip(self), fields(saved_id = %saved_id))]
    pub async fn move_to_cart(&self, saved_id: SavedItemId) -> Result<()> {
        let customer_id = self.customer_id()?;
        let item = self.saved_item(saved_id)?;

        match self.cart_id() {
            Some(cart_id) => {
                let request = MoveToCartRequest {
                    saved_product_id: saved_id,
                    product_id: item.product_id,
                };
                let body = self
                    .inner
                    .api
                    .put(&endpoints::move_to_cart(cart_id), &request)
                    .await;
                self.finish_saved_mutation(body).await
            }
            None => {
                // No cart yet: adding creates it, then drop the saved entry.
                let add = AddToCartRequest {
                    customer_id,
                    product_id: item.product_id,
                    quantity: 1,
                };
                let added = self.inner.api.post(endpoints::CART, &add).await;
                if let Err(e) = added.and_then(ApiClient::expect_ack) {
                    return self.finish_saved_mutation(Err(e)).await;
                }
                let body = self.delete_saved_request(customer_id, saved_id).await;
                self.finish_saved_mutation(body).await
            }
        }
    }

    /// Delete a saved item, then refresh both lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown or the backend rejects it.
    #[instrument(skip(self), fields(saved_id = %saved_id))]
    pub async fn delete_saved(&self, saved_id: SavedItemId) -> Result<()> {
        let customer_id = self.customer_id()?;
        self.saved_item(saved_id)?;
        let body = self.delete_saved_request(customer_id, saved_id).await;
        self.finish_saved_mutation(body).await
    }

    fn saved_item(&self, saved_id: SavedItemId) -> Result<SavedItem> {
        self.inner
            .saved
            .lock()
            .iter()
            .find(|item| item.saved_id == saved_id)
            .cloned()
            .ok_or_else(|| CartError::SavedNotFound(saved_id).into())
    }

    async fn delete_saved_request(
        &self,
        customer_id: CustomerId,
        saved_id: SavedItemId,
    ) -> std::result::Result<Option<serde_json::Value>, ApiError> {
        let body = serde_json::to_value(DeleteSavedRequest {
            saved_product_id: saved_id,
        })?;
        self.inner
            .api
            .delete(&endpoints::saved_products(customer_id), Some(&body))
            .await
    }

    /// Saved-list mutations never trust partial updates: both collections
    /// are re-fetched whatever the outcome.
    async fn finish_saved_mutation(
        &self,
        body: std::result::Result<Option<serde_json::Value>, ApiError>,
    ) -> Result<()> {
        let outcome = body.and_then(ApiClient::expect_ack);
        let refreshed = self.refresh_all().await;
        outcome?;
        refreshed
    }

    /// Start removing a line. Nothing is sent until the returned value is
    /// passed to [`confirm_removal`](Self::confirm_removal).
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not in the cart.
    pub fn request_removal(&self, item_id: CartItemId) -> Result<PendingRemoval> {
        let line = self.local_line(item_id)?;
        Ok(PendingRemoval {
            item_id,
            title: line.title,
        })
    }

    /// Delete a confirmed removal and re-fetch the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete; the cart is
    /// re-fetched either way.
    #[instrument(skip(self), fields(item_id = %pending.item_id))]
    pub async fn confirm_removal(&self, pending: PendingRemoval) -> Result<Cart> {
        self.customer_id()?;
        let Some(cart_id) = self.cart_id() else {
            return Err(CartError::LineNotFound(pending.item_id).into());
        };

        let outcome = self
            .inner
            .api
            .delete(&endpoints::cart_item(cart_id, pending.item_id), None)
            .await
            .and_then(ApiClient::expect_ack);
        let cart = self.fetch_cart().await;
        outcome?;
        info!("Removed from cart");
        cart
    }

    /// Forget all cart state, e.g. after sign-out or a placed order.
    pub fn reset(&self) {
        self.install(Cart::default());
        self.inner.saved.lock().clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use crate::events::EventBus;
    use crate::session::Session;

    fn manager() -> CartManager {
        let config = StorefrontConfig::for_api_base("http://127.0.0.1:9").unwrap();
        let api = ApiClient::new(&config, Session::in_memory(), EventBus::default());
        CartManager::new(api, ErrorCodeConfig::default())
    }

    #[test]
    fn test_saving_line_slot_is_exclusive() {
        let slot = Mutex::new(None);
        let guard = SavingLine::acquire(&slot, CartItemId::new(1)).unwrap();
        let err = SavingLine::acquire(&slot, CartItemId::new(2)).unwrap_err();
        assert!(matches!(
            err,
            AppError::Cart(CartError::UpdateInFlight { line }) if line == CartItemId::new(1)
        ));
        drop(guard);
        assert!(slot.lock().is_none());
        assert!(SavingLine::acquire(&slot, CartItemId::new(2)).is_ok());
    }

    #[tokio::test]
    async fn test_signed_out_fetch_is_empty_not_error() {
        let cart = manager().fetch_cart().await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_mutations_are_refused() {
        let manager = manager();
        let err = manager
            .change_quantity(CartItemId::new(1), 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::SignedOut)));
        assert!(manager.saving_line().is_none());
    }

    #[test]
    fn test_removal_requires_known_line() {
        let err = manager().request_removal(CartItemId::new(5)).unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::LineNotFound(_))));
    }
}
