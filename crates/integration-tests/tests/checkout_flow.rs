//! Integration tests for address selection, pincode lookups and order
//! submission.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use craftmart_core::{OrderId, Pincode};
use craftmart_integration_tests::{FakeBackend, Reply, drain, fixtures, ok};
use craftmart_storefront::address::AddressDraft;
use craftmart_storefront::checkout::CheckoutError;
use craftmart_storefront::error::{AppError, FormField};
use craftmart_storefront::events::{Route, StoreEvent};
use craftmart_storefront::models::Cart;
use craftmart_storefront::state::AppState;

const ADDRESSES: &str = "customer/7/address";
const CREATE: &str = "sell_order/create";

fn serviceability(pincode: &str) -> String {
    format!("logistic_partner/get_pincode_serviceability/{pincode}")
}

fn delivery(pincode: &str) -> String {
    format!("logistic_partner/get_delivery_charge/{pincode}")
}

fn pin(raw: &str) -> Pincode {
    Pincode::parse(raw).unwrap()
}

/// Signed in as customer 7 with the fixture cart and `addresses` loaded.
async fn ready(backend: &FakeBackend, addresses: serde_json::Value) -> (AppState, Cart) {
    backend.respond("GET", "cart", 200, ok(fixtures::cart()));
    backend.respond("GET", ADDRESSES, 200, ok(addresses));
    let state = backend.signed_in_state(7, "token", Some("refresh"));
    let cart = state.cart().fetch_cart().await.unwrap();
    state.addresses().list().await.unwrap();
    backend.reset_hits();
    (state, cart)
}

// =============================================================================
// Totals and lookups
// =============================================================================

#[tokio::test]
async fn test_totals_use_fetched_delivery_charge() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "prepaid": true })));
    backend.respond("GET", &delivery("625001"), 200, ok(json!({ "delivery_charge": 70 })));

    state.checkout().prefetch().await;
    let totals = state.checkout().totals(&cart, Some(&pin("625001")));
    assert_eq!(totals.subtotal, Decimal::from(250));
    assert_eq!(totals.delivery_charge, Decimal::from(70));
    assert_eq!(totals.total, Decimal::from(320));
}

#[tokio::test]
async fn test_failed_charge_lookup_is_cached_and_defaults() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([])).await;
    backend.respond("GET", &delivery("560001"), 500, json!({ "message": "Partner down" }));
    let checkout = state.checkout();

    assert_eq!(checkout.fetch_delivery_charge(&pin("560001")).await, Decimal::from(70));
    assert_eq!(checkout.fetch_delivery_charge(&pin("560001")).await, Decimal::from(70));
    assert_eq!(backend.hits("GET", &delivery("560001")), 1);

    let entry = checkout.delivery_charge_entry(&pin("560001")).unwrap();
    assert!(entry.value.is_none());
    assert_eq!(entry.error.as_deref(), Some("Partner down"));
    assert_eq!(
        checkout.totals(&cart, Some(&pin("560001"))).total,
        Decimal::from(320)
    );
}

#[tokio::test]
async fn test_concurrent_serviceability_checks_share_one_request() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([])).await;
    backend.respond_with(
        "GET",
        &serviceability("400001"),
        Reply::new(200, ok(json!({ "prepaid": "1" }))).delayed(Duration::from_millis(200)),
    );
    let checkout = state.checkout();
    let pincode = pin("400001");

    let (first, second) = tokio::join!(
        checkout.check_serviceability(&pincode),
        checkout.check_serviceability(&pincode)
    );

    assert_eq!(backend.hits("GET", &serviceability("400001")), 1);
    assert_eq!(first.prepaid, Some(true));
    assert!(second.checking);
    assert_eq!(checkout.serviceability(&pincode).unwrap().prepaid, Some(true));
}

#[tokio::test]
async fn test_selection_moves_off_unserviceable_address() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(
        &backend,
        json!([
            fixtures::address(31, "625001", true),
            fixtures::address(32, "110001", false),
        ]),
    )
    .await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "prepaid": false })));
    backend.respond("GET", &serviceability("110001"), 200, ok(json!({ "prepaid": true })));
    backend.respond("GET", &delivery("625001"), 200, ok(json!({ "delivery_charge": 70 })));
    backend.respond("GET", &delivery("110001"), 200, ok(json!({ "delivery_charge": 90 })));
    let checkout = state.checkout();
    assert_eq!(checkout.selected_address().unwrap().local_id, "31");

    checkout.prefetch().await;
    // Lookups alone leave the selection where it was.
    assert_eq!(checkout.selected_address().unwrap().local_id, "31");

    checkout.refresh_selection();
    assert_eq!(checkout.selected_address().unwrap().local_id, "32");
    assert!(checkout.select_address("31"));
    assert_eq!(checkout.selected_address().unwrap().local_id, "32");
}

// =============================================================================
// Blocking reasons
// =============================================================================

#[tokio::test]
async fn test_order_without_address_sends_nothing() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([])).await;

    let err = state.checkout().place_order(&cart).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Checkout(CheckoutError::AddressRequired)
    ));
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_empty_cart_is_blocked() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;

    let err = state
        .checkout()
        .place_order(&Cart::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Checkout(CheckoutError::EmptyCart)));
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_order_blocked_while_serviceability_pending() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond_with(
        "GET",
        &serviceability("625001"),
        Reply::new(200, ok(json!({ "prepaid": true }))).delayed(Duration::from_millis(300)),
    );
    let checkout = state.checkout();
    let pincode = pin("625001");

    let (_, placed) = tokio::join!(checkout.check_serviceability(&pincode), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        checkout.place_order(&cart).await
    });

    assert!(matches!(
        placed.unwrap_err(),
        AppError::Checkout(CheckoutError::ServiceabilityPending(p)) if p == pincode
    ));
    assert_eq!(backend.hits("POST", CREATE), 0);
}

#[tokio::test]
async fn test_abandoned_check_does_not_block_later_orders() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond_with(
        "GET",
        &serviceability("625001"),
        Reply::new(200, ok(json!({ "prepaid": true }))).delayed(Duration::from_millis(300)),
    );
    backend.respond("POST", CREATE, 200, ok(json!({ "order_id": "SO-10" })));
    let checkout = state.checkout();
    let pincode = pin("625001");

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), checkout.check_serviceability(&pincode))
            .await;
    assert!(abandoned.is_err());
    assert!(checkout.serviceability(&pincode).is_none());

    let entry = checkout.check_serviceability(&pincode).await;
    assert!(!entry.checking);
    assert_eq!(entry.prepaid, Some(true));

    let outcome = checkout.place_order(&cart).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(backend.hits("POST", CREATE), 1);
}

#[tokio::test]
async fn test_just_in_time_check_refuses_unserviceable_pincode() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "is_prepaid": 0 })));

    let err = state.checkout().place_order(&cart).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Checkout(CheckoutError::NotServiceable(_))
    ));
    assert_eq!(backend.hits("GET", &serviceability("625001")), 1);
    assert_eq!(backend.hits("POST", CREATE), 0);
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_successful_order_clears_cart_and_navigates() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "prepaid": true })));
    backend.respond("POST", CREATE, 200, ok(json!({ "order_id": "SO-9" })));
    let mut events = state.events().subscribe();

    let outcome = state.checkout().place_order(&cart).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.order_id, Some(OrderId::new("SO-9")));
    assert_eq!(
        backend.requests("POST", CREATE)[0].body,
        Some(json!({ "customerId": 7, "deliveryAddressId": 31, "billingAddressId": 31 }))
    );
    assert!(state.cart().local().is_empty());
    assert_eq!(state.session().cart_count(), 0);
    assert_eq!(
        drain(&mut events),
        vec![
            StoreEvent::CartChanged { count: 0 },
            StoreEvent::Navigate(Route::OrderSuccess {
                order_id: Some(OrderId::new("SO-9")),
                total: None,
            }),
        ]
    );
}

#[tokio::test]
async fn test_rejected_order_routes_to_failure_with_reason() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "prepaid": true })));
    backend.respond(
        "POST",
        CREATE,
        200,
        json!({ "ack": "failure", "error": { "message": "Payment gateway unavailable" } }),
    );

    let outcome = state.checkout().place_order(&cart).await.unwrap();

    assert!(!outcome.is_success());
    assert_eq!(
        outcome.route,
        Route::OrderFailure {
            reason: "Payment gateway unavailable".to_string(),
            order_id: None,
        }
    );
    assert_eq!(state.cart().local().item_count(), 3);
}

#[tokio::test]
async fn test_error_reply_keeps_partial_order_id() {
    let backend = FakeBackend::start().await;
    let (state, cart) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    backend.respond("GET", &serviceability("625001"), 200, ok(json!({ "prepaid": true })));
    backend.respond(
        "POST",
        CREATE,
        400,
        json!({
            "ack": "failure",
            "orderId": "ORD-9",
            "error": { "code": 5, "message": "Payment declined" }
        }),
    );
    let mut events = state.events().subscribe();

    let outcome = state.checkout().place_order(&cart).await.unwrap();

    let expected = Route::OrderFailure {
        reason: "Payment declined".to_string(),
        order_id: Some(OrderId::new("ORD-9")),
    };
    assert_eq!(outcome.route, expected);
    assert_eq!(outcome.order_id, Some(OrderId::new("ORD-9")));
    assert_eq!(drain(&mut events), vec![StoreEvent::Navigate(expected)]);
    assert_eq!(state.cart().local().item_count(), 3);
}

// =============================================================================
// Address book
// =============================================================================

#[tokio::test]
async fn test_invalid_server_pincode_is_skipped() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(
        &backend,
        json!([
            fixtures::address(31, "625001", false),
            fixtures::address(32, "0625", false),
        ]),
    )
    .await;

    let listed = state.addresses().entries();
    assert_eq!(listed.len(), 1);
    assert_eq!(state.addresses().cached(), listed);
}

fn script_geo(backend: &FakeBackend) {
    backend.respond("GET", "master/countries", 200, ok(json!([{ "id": 1, "name": "India" }])));
    backend.respond("GET", "master/states", 200, ok(json!([{ "id": 33, "name": "Tamil Nadu" }])));
    backend.respond("GET", "master/cities", 200, ok(json!([{ "id": 7, "title": "Madurai" }])));
}

async fn filled_draft(state: &AppState, pincode: &str) -> AddressDraft {
    let book = state.addresses();
    book.open_add();
    let country = book.countries().await.unwrap().remove(0);
    let region = book.select_country(country).await.unwrap().remove(0);
    let city = book.select_state(region).await.unwrap().remove(0);
    book.select_city(city);
    AddressDraft {
        recipient_name: "Meera Iyer".to_string(),
        contact: "9876543210".to_string(),
        line1: "4 Handloom Street".to_string(),
        pincode: pincode.to_string(),
        ..book.draft()
    }
}

#[tokio::test]
async fn test_geo_master_data_is_cached() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([])).await;
    script_geo(&backend);

    filled_draft(&state, "625001").await;
    filled_draft(&state, "625001").await;

    assert_eq!(backend.hits("GET", "master/countries"), 1);
    assert_eq!(backend.hits("GET", "master/states"), 1);
    assert_eq!(backend.hits("GET", "master/cities"), 1);
    assert_eq!(
        backend.requests("GET", "master/states")[0].query.as_deref(),
        Some("country_id=1")
    );
    let cascade = state.addresses().cascade();
    assert_eq!(cascade.city.unwrap().name, "Madurai");
}

#[tokio::test]
async fn test_saved_address_shows_immediately_then_server_list_wins() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    script_geo(&backend);
    backend.respond_with(
        "POST",
        ADDRESSES,
        Reply::new(200, ok(json!({ "id": 32 }))).delayed(Duration::from_millis(200)),
    );
    backend.respond(
        "GET",
        ADDRESSES,
        200,
        ok(json!([
            fixtures::address(32, "110001", false),
            fixtures::address(31, "625001", true),
        ])),
    );
    let draft = filled_draft(&state, "110001").await;
    let book = state.addresses();

    let (saved, shown) = tokio::join!(book.save(&draft), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        book.entries()
    });

    assert_eq!(shown.len(), 2);
    let pending = &shown[1];
    assert!(pending.local_id.starts_with("tmp-"));
    assert!(pending.is_pending());

    let saved = saved.unwrap();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|a| !a.is_pending()));
    assert_eq!(book.entries(), saved);
    assert_eq!(state.checkout().selected_address().unwrap().local_id, "32");

    let post = backend.requests("POST", ADDRESSES);
    let body = post[0].body.as_ref().unwrap();
    assert_eq!(body["pincode"], "110001");
    assert_eq!(body["city_id"], 7);
}

#[tokio::test]
async fn test_temporary_address_dropped_when_list_refresh_fails() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([fixtures::address(31, "625001", true)])).await;
    script_geo(&backend);
    backend.respond("POST", ADDRESSES, 200, ok(json!({ "id": 32 })));
    backend.respond("GET", ADDRESSES, 503, json!({ "message": "Service unavailable" }));
    let draft = filled_draft(&state, "110001").await;
    let book = state.addresses();

    let err = book.save(&draft).await.unwrap_err();

    assert_eq!(err.user_message(), "Service unavailable");
    assert_eq!(backend.hits("POST", ADDRESSES), 1);
    let entries = book.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries.iter().all(|a| !a.is_pending()));
    assert_eq!(state.checkout().selected_address().unwrap().local_id, "31");
}

#[tokio::test]
async fn test_invalid_draft_sends_nothing() {
    let backend = FakeBackend::start().await;
    let (state, _) = ready(&backend, json!([])).await;
    script_geo(&backend);
    let draft = filled_draft(&state, "012345").await;
    backend.reset_hits();

    let err = state.addresses().save(&draft).await.unwrap_err();
    let fields = err.field_errors().unwrap();
    assert!(fields.get(FormField::Pincode).is_some());
    assert_eq!(backend.total_hits(), 0);
}
