//! Integration tests for bearer auth and the single silent token refresh.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;

use craftmart_core::{CustomerId, ProductId};
use craftmart_integration_tests::{FakeBackend, drain, failure, fixtures, ok};
use craftmart_storefront::events::{Route, StoreEvent};

const REFRESH: &str = "customer/refresh_token";

fn new_tokens() -> serde_json::Value {
    ok(json!({ "accessToken": "new", "refreshToken": "r2", "customerId": 7 }))
}

// =============================================================================
// Refresh and retry
// =============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_request_retried() {
    let backend = FakeBackend::start().await;
    backend.respond_once("GET", "cart", 401, failure(401, "Token expired"));
    backend.respond("GET", "cart", 200, ok(fixtures::cart()));
    backend.respond("POST", REFRESH, 200, new_tokens());
    let state = backend.signed_in_state(7, "old", Some("r1"));

    let cart = state.cart().fetch_cart().await.unwrap();
    assert_eq!(cart.lines.len(), 2);

    assert_eq!(backend.hits("POST", REFRESH), 1);
    let refresh = backend.requests("POST", REFRESH);
    assert_eq!(refresh[0].body, Some(json!({ "refreshToken": "r1" })));
    assert_eq!(refresh[0].bearer, None);

    let bearers: Vec<_> = backend
        .requests("GET", "cart")
        .into_iter()
        .map(|r| r.bearer)
        .collect();
    assert_eq!(bearers, vec![Some("old".to_string()), Some("new".to_string())]);
}

#[tokio::test]
async fn test_token_message_on_403_also_refreshes() {
    let backend = FakeBackend::start().await;
    backend.respond_once("GET", "cart", 403, json!({ "message": "invalid token" }));
    backend.respond("GET", "cart", 200, ok(fixtures::cart()));
    backend.respond("POST", REFRESH, 200, new_tokens());
    let state = backend.signed_in_state(7, "old", Some("r1"));

    state.cart().fetch_cart().await.unwrap();
    assert_eq!(backend.hits("POST", REFRESH), 1);
    assert_eq!(backend.hits("GET", "cart"), 2);
}

#[tokio::test]
async fn test_failed_refresh_signs_the_shopper_out() {
    let backend = FakeBackend::start().await;
    backend.respond("GET", "cart", 401, failure(401, "Token expired"));
    backend.respond("POST", REFRESH, 401, failure(401, "Refresh token expired"));
    let state = backend.signed_in_state(7, "old", Some("r1"));
    let mut events = state.events().subscribe();

    let err = state.cart().fetch_cart().await.unwrap_err();
    assert!(err.is_auth_required());

    let session = state.session();
    assert!(session.access_token().is_none());
    assert!(session.refresh_token().is_none());
    assert!(session.customer_id().is_none());
    assert_eq!(
        drain(&mut events),
        vec![
            StoreEvent::AuthChanged { signed_in: false },
            StoreEvent::Navigate(Route::Login),
        ]
    );
    // The original request is not retried without a new token.
    assert_eq!(backend.hits("GET", "cart"), 1);
}

#[tokio::test]
async fn test_missing_refresh_token_signs_out_without_calling_refresh() {
    let backend = FakeBackend::start().await;
    backend.respond("GET", "cart", 401, failure(401, "Token expired"));
    let state = backend.signed_in_state(7, "old", None);

    let err = state.cart().fetch_cart().await.unwrap_err();
    assert!(err.is_auth_required());
    assert_eq!(backend.hits("POST", REFRESH), 0);
    assert!(!state.session().is_authenticated());
}

#[tokio::test]
async fn test_rejected_retry_is_not_retried_again() {
    let backend = FakeBackend::start().await;
    backend.respond("GET", "cart", 401, failure(401, "Unauthorized"));
    backend.respond("POST", REFRESH, 200, new_tokens());
    let state = backend.signed_in_state(7, "old", Some("r1"));

    let err = state.cart().fetch_cart().await.unwrap_err();
    assert!(err.is_auth_required());
    assert_eq!(backend.hits("GET", "cart"), 2);
    assert_eq!(backend.hits("POST", REFRESH), 1);
    assert!(state.session().access_token().is_none());
}

// =============================================================================
// Concurrency and anonymous requests
// =============================================================================

#[tokio::test]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let backend = FakeBackend::start().await;
    let saved = "customer/7/saved_product";
    backend.respond_once("GET", "cart", 401, failure(401, "Token expired"));
    backend.respond("GET", "cart", 200, ok(fixtures::cart()));
    backend.respond_once("GET", saved, 401, failure(401, "Token expired"));
    backend.respond("GET", saved, 200, ok(json!([])));
    backend.respond("POST", REFRESH, 200, new_tokens());
    let state = backend.signed_in_state(7, "old", Some("r1"));

    state.cart().refresh_all().await.unwrap();

    assert_eq!(backend.hits("POST", REFRESH), 1);
    assert_eq!(backend.hits("GET", "cart"), 2);
    assert_eq!(backend.hits("GET", saved), 2);
    assert_eq!(
        backend.requests("GET", saved)[1].bearer.as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn test_anonymous_401_is_returned_without_refresh() {
    let backend = FakeBackend::start().await;
    backend.respond("GET", "product/sell/5", 401, failure(401, "Unauthorized"));
    let state = backend.app_state();
    let mut events = state.events().subscribe();

    let err = state.catalog().product(ProductId::new(5)).await.unwrap_err();
    assert!(!err.is_auth_required());
    assert_eq!(backend.hits("POST", REFRESH), 0);
    assert_eq!(backend.requests("GET", "product/sell/5")[0].bearer, None);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_stale_credentials_are_cleared_on_unauthenticated_401() {
    let backend = FakeBackend::start().await;
    backend.respond("GET", "product/sell/5", 401, failure(401, "Unauthorized"));
    let state = backend.app_state();
    state.session().set_customer_id(CustomerId::new(7)).unwrap();
    let mut events = state.events().subscribe();

    let err = state.catalog().product(ProductId::new(5)).await.unwrap_err();

    assert!(err.is_auth_required());
    assert!(state.session().customer_id().is_none());
    assert_eq!(backend.hits("POST", REFRESH), 0);
    assert_eq!(
        drain(&mut events),
        vec![
            StoreEvent::AuthChanged { signed_in: false },
            StoreEvent::Navigate(Route::Login),
        ]
    );
}
