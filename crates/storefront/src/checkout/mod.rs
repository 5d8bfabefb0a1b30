//! Checkout orchestration.
//!
//! Picks a deliverable address, checks that the pincode accepts prepaid
//! orders, prices delivery, and submits the order exactly once.

mod cache;

pub use cache::{Claim, ClaimGuard, DeliveryChargeEntry, PincodeCache, PincodeEntry, ServiceabilityEntry};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use craftmart_core::{OrderId, Pincode};

use crate::api::endpoints;
use crate::api::types::{CreateOrderRequest, CreateOrderResponse, DeliveryChargeDto, ServiceabilityDto};
use crate::api::{ApiClient, ApiError};
use crate::cart::CartManager;
use crate::config::CheckoutConfig;
use crate::error::Result;
use crate::events::Route;
use crate::models::{Address, Cart};

/// Reasons an order is not submitted. None of them issues a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Please select a delivery address")]
    AddressRequired,

    #[error("Still checking delivery to {0}. Please wait a moment.")]
    ServiceabilityPending(Pincode),

    #[error("Prepaid delivery is not available for pincode {0}")]
    NotServiceable(Pincode),

    #[error("Your order is already being placed")]
    AlreadySubmitting,

    #[error("Please sign in to place your order")]
    SignedOut,

    #[error("Your cart is empty")]
    EmptyCart,
}

/// Amounts shown on the checkout summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTotals {
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub total: Decimal,
}

impl CheckoutTotals {
    #[must_use]
    pub fn compute(cart: &Cart, delivery_charge: Decimal) -> Self {
        let subtotal = cart.subtotal();
        Self {
            subtotal,
            delivery_charge,
            total: subtotal + delivery_charge,
        }
    }
}

/// Where the shopper ended up after submitting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOutcome {
    pub route: Route,
    pub order_id: Option<OrderId>,
}

impl OrderOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.route, Route::OrderSuccess { .. })
    }
}

/// Holds the order-submission latch until dropped.
struct Submitting<'a>(&'a AtomicBool);

impl<'a> Submitting<'a> {
    fn acquire(flag: &'a AtomicBool) -> std::result::Result<Self, CheckoutError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| CheckoutError::AlreadySubmitting)
    }
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// Checkout state: address selection plus pincode lookups.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    api: ApiClient,
    cart: CartManager,
    config: CheckoutConfig,
    serviceability: PincodeCache<ServiceabilityEntry>,
    delivery: PincodeCache<DeliveryChargeEntry>,
    addresses: Mutex<Vec<Address>>,
    /// `local_id` of the selected address.
    selected: Mutex<Option<String>>,
    submitting: AtomicBool,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("addresses", &self.inner.addresses.lock().len())
            .field("selected", &*self.inner.selected.lock())
            .field("submitting", &self.inner.submitting.load(Ordering::Relaxed))
            .finish()
    }
}

impl Checkout {
    #[must_use]
    pub fn new(api: ApiClient, cart: CartManager, config: CheckoutConfig) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                api,
                cart,
                config,
                serviceability: PincodeCache::default(),
                delivery: PincodeCache::default(),
                addresses: Mutex::new(Vec::new()),
                selected: Mutex::new(None),
                submitting: AtomicBool::new(false),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Address selection
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the address list and re-run selection.
    pub fn set_addresses(&self, addresses: Vec<Address>) {
        *self.inner.addresses.lock() = addresses;
        self.refresh_selection();
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.inner.addresses.lock().clone()
    }

    /// Select an address by local id, then re-run selection.
    ///
    /// Returns `false` if no address has that id.
    pub fn select_address(&self, local_id: &str) -> bool {
        let known = self
            .inner
            .addresses
            .lock()
            .iter()
            .any(|a| a.local_id == local_id);
        if known {
            *self.inner.selected.lock() = Some(local_id.to_string());
            self.refresh_selection();
        }
        known
    }

    #[must_use]
    pub fn selected_address(&self) -> Option<Address> {
        let selected = self.inner.selected.lock().clone()?;
        self.inner
            .addresses
            .lock()
            .iter()
            .find(|a| a.local_id == selected)
            .cloned()
    }

    /// Move the selection off an address known to be unserviceable.
    ///
    /// Runs when the address list or the selection changes; serviceability
    /// results arriving do not trigger it. The replacement is the first
    /// address not known to be unserviceable (unknown counts as fine), or
    /// nothing. With no valid selection, the default address is preferred.
    pub fn refresh_selection(&self) {
        let addresses = self.inner.addresses.lock().clone();
        let is_blocked = |a: &Address| {
            self.inner
                .serviceability
                .get(&a.pincode)
                .is_some_and(|e| e.is_unserviceable())
        };

        let mut selected = self.inner.selected.lock();
        let current = selected
            .as_deref()
            .and_then(|id| addresses.iter().find(|a| a.local_id == id));

        let keep = current.is_some_and(|a| !is_blocked(a));
        if keep {
            return;
        }

        let replacement = if current.is_none() {
            addresses
                .iter()
                .filter(|a| !is_blocked(a))
                .find(|a| a.is_default)
                .or_else(|| addresses.iter().find(|a| !is_blocked(a)))
        } else {
            addresses.iter().find(|a| !is_blocked(a))
        };

        let next = replacement.map(|a| a.local_id.clone());
        if *selected != next {
            debug!(from = ?*selected, to = ?next, "Address selection changed");
        }
        *selected = next;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pincode lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Cached serviceability for `pincode`, if any.
    #[must_use]
    pub fn serviceability(&self, pincode: &Pincode) -> Option<ServiceabilityEntry> {
        self.inner.serviceability.get(pincode)
    }

    /// Look up serviceability unless it is cached or already being checked.
    #[instrument(skip(self), fields(pincode = %pincode))]
    pub async fn check_serviceability(&self, pincode: &Pincode) -> ServiceabilityEntry {
        self.lookup_serviceability(pincode, false).await
    }

    async fn lookup_serviceability(&self, pincode: &Pincode, refetch: bool) -> ServiceabilityEntry {
        let guard = match self.inner.serviceability.claim(pincode, refetch) {
            Claim::Existing(entry) => return entry,
            Claim::Fetch(guard) => guard,
        };

        let entry = match self
            .inner
            .api
            .get_data::<ServiceabilityDto>(&endpoints::serviceability(pincode.as_str()))
            .await
        {
            Ok(dto) => ServiceabilityEntry {
                checking: false,
                prepaid: dto.prepaid,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Serviceability lookup failed");
                ServiceabilityEntry {
                    checking: false,
                    prepaid: None,
                    error: Some(e.user_message()),
                }
            }
        };
        debug!(prepaid = ?entry.prepaid, "Serviceability cached");
        guard.settle(entry.clone());
        entry
    }

    /// Cached delivery charge entry for `pincode`, if any.
    #[must_use]
    pub fn delivery_charge_entry(&self, pincode: &Pincode) -> Option<DeliveryChargeEntry> {
        self.inner.delivery.get(pincode)
    }

    /// Delivery charge for `pincode`, fetched once and cached.
    ///
    /// A failed lookup caches the error and yields the default charge.
    #[instrument(skip(self), fields(pincode = %pincode))]
    pub async fn fetch_delivery_charge(&self, pincode: &Pincode) -> Decimal {
        let entry = match self.inner.delivery.claim(pincode, false) {
            Claim::Existing(entry) => entry,
            Claim::Fetch(guard) => {
                let entry = match self
                    .inner
                    .api
                    .get_data::<DeliveryChargeDto>(&endpoints::delivery_charge(pincode.as_str()))
                    .await
                {
                    Ok(dto) => DeliveryChargeEntry {
                        checking: false,
                        value: Some(dto.amount()),
                        error: None,
                    },
                    Err(e) => {
                        warn!(error = %e, "Delivery charge lookup failed, using default");
                        DeliveryChargeEntry {
                            checking: false,
                            value: None,
                            error: Some(e.user_message()),
                        }
                    }
                };
                guard.settle(entry.clone());
                entry
            }
        };
        entry.value.unwrap_or(self.inner.config.default_delivery_charge)
    }

    /// Totals using whatever charge is cached for `pincode`.
    ///
    /// Without a cached charge (or without an address) the default charge is
    /// used, so totals can always be shown.
    #[must_use]
    pub fn totals(&self, cart: &Cart, pincode: Option<&Pincode>) -> CheckoutTotals {
        let charge = pincode
            .and_then(|p| self.inner.delivery.get(p))
            .and_then(|e| e.value)
            .unwrap_or(self.inner.config.default_delivery_charge);
        CheckoutTotals::compute(cart, charge)
    }

    /// Look up serviceability and delivery charge for every address.
    pub async fn prefetch(&self) {
        let pincodes: Vec<Pincode> = self
            .inner
            .addresses
            .lock()
            .iter()
            .map(|a| a.pincode.clone())
            .collect();
        for pincode in &pincodes {
            tokio::join!(
                self.check_serviceability(pincode),
                self.fetch_delivery_charge(pincode)
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Order submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit an order for `cart` to the selected address.
    ///
    /// Blocks without any request when no address is selected, the cart is
    /// empty, serviceability is still being checked or is known to be
    /// negative, or another submission is in flight. An unknown
    /// serviceability is checked just in time; if it stays unknown the order
    /// goes ahead.
    ///
    /// The outcome route is also published on the event bus.
    ///
    /// # Errors
    ///
    /// Returns a `CheckoutError` for the blocking cases and
    /// `ApiError::AuthRequired` when the session expired mid-checkout.
    #[instrument(skip(self, cart))]
    pub async fn place_order(&self, cart: &Cart) -> Result<OrderOutcome> {
        let _submitting = Submitting::acquire(&self.inner.submitting)?;

        let address = self
            .selected_address()
            .ok_or(CheckoutError::AddressRequired)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart.into());
        }
        let session = self.inner.api.session();
        let customer_id = match session.customer_id() {
            Some(id) if session.is_authenticated() => id,
            _ => return Err(CheckoutError::SignedOut.into()),
        };

        self.ensure_serviceable(&address.pincode).await?;

        let totals = self.totals(cart, Some(&address.pincode));
        let reference = address.reference();
        let request = CreateOrderRequest {
            customer_id,
            delivery_address_id: reference.clone(),
            billing_address_id: reference,
        };

        let response = match self.inner.api.post(endpoints::CREATE_ORDER, &request).await {
            Ok(body) => body
                .map(serde_json::from_value::<CreateOrderResponse>)
                .transpose()
                .map(Option::unwrap_or_default)
                .map_err(ApiError::from),
            Err(e) => Err(e),
        };

        let outcome = match response {
            Ok(response) if response.is_success() => {
                let order_id = response.order_id().cloned();
                info!(order_id = ?order_id, total = %totals.total, "Order placed");
                self.inner.cart.reset();
                OrderOutcome {
                    route: Route::OrderSuccess {
                        total: order_id.is_none().then_some(totals.total),
                        order_id: order_id.clone(),
                    },
                    order_id,
                }
            }
            Ok(response) => {
                let order_id = response.order_id().cloned();
                let reason = response.failure_reason();
                warn!(reason = %reason, "Order rejected");
                OrderOutcome {
                    route: Route::OrderFailure {
                        reason,
                        order_id: order_id.clone(),
                    },
                    order_id,
                }
            }
            Err(ApiError::AuthRequired) => return Err(ApiError::AuthRequired.into()),
            Err(e) => {
                warn!(error = %e, "Order request failed");
                // An error reply may still name the order it partially created.
                let order_id = e
                    .body()
                    .and_then(|body| CreateOrderResponse::deserialize(body).ok())
                    .and_then(|response| response.order_id().cloned());
                OrderOutcome {
                    route: Route::OrderFailure {
                        reason: e.user_message(),
                        order_id: order_id.clone(),
                    },
                    order_id,
                }
            }
        };

        self.inner.api.events().navigate(outcome.route.clone());
        Ok(outcome)
    }

    async fn ensure_serviceable(&self, pincode: &Pincode) -> std::result::Result<(), CheckoutError> {
        let cached = self.inner.serviceability.get(pincode);
        let entry = match cached {
            Some(entry) if entry.checking => {
                return Err(CheckoutError::ServiceabilityPending(pincode.clone()));
            }
            Some(entry) if entry.prepaid.is_some() => entry,
            _ => {
                debug!("Serviceability unknown, checking before ordering");
                self.lookup_serviceability(pincode, true).await
            }
        };

        if entry.checking {
            return Err(CheckoutError::ServiceabilityPending(pincode.clone()));
        }
        if entry.is_unserviceable() {
            return Err(CheckoutError::NotServiceable(pincode.clone()));
        }
        Ok(())
    }
}
