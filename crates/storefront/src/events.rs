//! Typed cross-component notifications.
//!
//! Views subscribe to an [`EventBus`] to learn that the shopper signed in or
//! out, that the cart badge changed, or that a flow wants to navigate
//! somewhere (login, order result pages).

use rust_decimal::Decimal;
use tokio::sync::broadcast;

use craftmart_core::{Money, OrderId};

/// Default number of buffered events per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Event published by the storefront modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The shopper signed in or out (including forced sign-out on expired auth).
    AuthChanged { signed_in: bool },
    /// The number of items in the cart changed.
    CartChanged { count: u32 },
    /// A flow finished and the view should move to `Route`.
    Navigate(Route),
}

/// Destinations a flow can send the shopper to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Cart,
    /// Order placed. Carries the order id, or the computed total when the
    /// backend acknowledged success without returning an id.
    OrderSuccess {
        order_id: Option<OrderId>,
        total: Option<Decimal>,
    },
    /// Order failed with a reason and, when the backend created one, a
    /// partial order id.
    OrderFailure {
        reason: String,
        order_id: Option<OrderId>,
    },
}

impl Route {
    /// Path and query string for this route.
    #[must_use]
    pub fn to_path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Cart => "/cart".to_string(),
            Self::OrderSuccess { order_id, total } => match (order_id, total) {
                (Some(id), _) => format!("/order-success?orderId={}", urlencoding::encode(id.as_str())),
                (None, Some(total)) => format!("/order-success?total={}", total.round_dp(2)),
                (None, None) => "/order-success".to_string(),
            },
            Self::OrderFailure { reason, order_id } => {
                let mut path = format!("/order-failure?reason={}", urlencoding::encode(reason));
                if let Some(id) = order_id {
                    path.push_str("&orderId=");
                    path.push_str(&urlencoding::encode(id.as_str()));
                }
                path
            }
        }
    }

    /// Short human description for terminal output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Home => "Home".to_string(),
            Self::Login => "Please sign in to continue".to_string(),
            Self::Cart => "Cart".to_string(),
            Self::OrderSuccess {
                order_id: Some(id), ..
            } => format!("Order placed: {id}"),
            Self::OrderSuccess {
                order_id: None,
                total,
            } => format!(
                "Order placed (total {})",
                Money::inr(total.unwrap_or_default())
            ),
            Self::OrderFailure { reason, order_id } => match order_id {
                Some(id) => format!("Order {id} failed: {reason}"),
                None => format!("Order failed: {reason}"),
            },
        }
    }
}

/// Broadcast channel of [`StoreEvent`]s.
///
/// Cheap to clone; publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, event: StoreEvent) {
        tracing::debug!(?event, "Publishing store event");
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    /// Shorthand for publishing [`StoreEvent::Navigate`].
    pub fn navigate(&self, route: Route) {
        self.publish(StoreEvent::Navigate(route));
    }
}
