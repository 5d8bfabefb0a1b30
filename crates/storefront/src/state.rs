//! Application state shared across views.

use std::sync::Arc;

use crate::account::Account;
use crate::address::AddressBook;
use crate::api::ApiClient;
use crate::cart::CartManager;
use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::contact::Contact;
use crate::events::EventBus;
use crate::orders::Orders;
use crate::session::{FileStorage, Session};

/// Everything a storefront view needs: configuration, the persisted session,
/// the event bus and one instance of each feature service.
///
/// This struct is cheaply cloneable via `Arc`; every clone shares the same
/// session, caches and in-flight guards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    session: Session,
    events: EventBus,
    api: ApiClient,
    cart: CartManager,
    checkout: Checkout,
    addresses: AddressBook,
    account: Account,
    catalog: Catalog,
    orders: Orders,
    contact: Contact,
}

impl AppState {
    /// State backed by the file at `config.state_path`.
    #[must_use]
    pub fn from_config(config: StorefrontConfig) -> Self {
        let storage = FileStorage::open(config.state_path.clone());
        Self::with_session(config, Session::new(Arc::new(storage)))
    }

    /// State over an existing session, e.g. an in-memory one in tests.
    #[must_use]
    pub fn with_session(config: StorefrontConfig, session: Session) -> Self {
        let events = EventBus::default();
        let api = ApiClient::new(&config, session.clone(), events.clone());
        let cart = CartManager::new(api.clone(), config.error_codes.clone());
        let checkout = Checkout::new(api.clone(), cart.clone(), config.checkout.clone());
        let addresses = AddressBook::new(api.clone(), checkout.clone());
        let account = Account::new(
            api.clone(),
            cart.clone(),
            config.error_codes.password_fields.clone(),
        );
        let catalog = Catalog::new(api.clone());
        let orders = Orders::new(api.clone());
        let contact = Contact::new(api.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                events,
                api,
                cart,
                checkout,
                addresses,
                account,
                catalog,
                orders,
                contact,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressBook {
        &self.inner.addresses
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &Orders {
        &self.inner.orders
    }

    #[must_use]
    pub fn contact(&self) -> &Contact {
        &self.inner.contact
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api_base", &self.inner.config.api_base.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_services_share_one_session() {
        let config = StorefrontConfig::for_api_base("http://127.0.0.1:9").unwrap();
        let state = AppState::with_session(config, Session::in_memory());
        state.session().set_cart_count(4).unwrap();
        assert_eq!(state.api().session().cart_count(), 4);
        assert!(!state.account().is_signed_in());
    }
}
