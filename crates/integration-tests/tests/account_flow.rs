//! Integration tests for sign-in, registration and password changes.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use secrecy::SecretString;
use serde_json::json;

use craftmart_core::CustomerId;
use craftmart_integration_tests::{FakeBackend, drain, failure, fixtures, ok};
use craftmart_storefront::account::{LoginForm, RegisterForm};
use craftmart_storefront::error::FormField;
use craftmart_storefront::events::StoreEvent;

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn login_form(remember: bool) -> LoginForm {
    LoginForm {
        username: " meera@example.in ".to_string(),
        password: secret("handloom-42"),
        remember,
    }
}

// =============================================================================
// Sign in / sign out
// =============================================================================

#[tokio::test]
async fn test_login_stores_session_and_loads_cart() {
    let backend = FakeBackend::start().await;
    backend.respond(
        "POST",
        "customer/login",
        200,
        ok(json!({ "access_token": "a1", "refresh_token": "r1", "customer_id": 7 })),
    );
    backend.respond("GET", "cart", 200, ok(fixtures::cart()));
    let state = backend.app_state();
    let mut events = state.events().subscribe();

    let customer = state.account().login(&login_form(true)).await.unwrap();

    assert_eq!(customer, Some(CustomerId::new(7)));
    assert_eq!(
        backend.requests("POST", "customer/login")[0].body,
        Some(json!({ "username": "meera@example.in", "password": "handloom-42" }))
    );
    let session = state.session();
    assert!(session.is_authenticated());
    assert_eq!(session.customer_id(), Some(CustomerId::new(7)));
    assert_eq!(session.remembered_user().as_deref(), Some("meera@example.in"));
    assert_eq!(backend.requests("GET", "cart")[0].bearer.as_deref(), Some("a1"));
    assert_eq!(
        drain(&mut events),
        vec![
            StoreEvent::AuthChanged { signed_in: true },
            StoreEvent::CartChanged { count: 3 },
        ]
    );
}

#[tokio::test]
async fn test_login_succeeds_even_if_cart_refresh_fails() {
    let backend = FakeBackend::start().await;
    backend.respond(
        "POST",
        "customer/login",
        200,
        ok(json!({ "token": "a1", "customerId": "7" })),
    );
    backend.respond("GET", "cart", 500, json!({ "message": "Cart service down" }));
    let state = backend.app_state();

    state.account().login(&login_form(false)).await.unwrap();
    assert!(state.account().is_signed_in());
    assert!(state.session().remembered_user().is_none());
}

#[tokio::test]
async fn test_empty_login_is_rejected_locally() {
    let backend = FakeBackend::start().await;
    let state = backend.app_state();
    let form = LoginForm {
        username: "  ".to_string(),
        password: secret(""),
        remember: false,
    };

    let err = state.account().login(&form).await.unwrap_err();
    let fields = err.field_errors().unwrap();
    assert!(fields.get(FormField::Username).is_some());
    assert!(fields.get(FormField::Password).is_some());
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_wrong_password_keeps_server_message() {
    let backend = FakeBackend::start().await;
    backend.respond(
        "POST",
        "customer/login",
        401,
        failure(1001, "Invalid username or password"),
    );
    let state = backend.app_state();

    let err = state.account().login(&login_form(false)).await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid username or password");
    assert!(!state.session().is_authenticated());
    assert_eq!(backend.hits("POST", "customer/refresh_token"), 0);
}

#[tokio::test]
async fn test_logout_clears_session_but_remembers_user() {
    let backend = FakeBackend::start().await;
    let state = backend.signed_in_state(7, "a1", Some("r1"));
    state.session().remember_user(Some("meera@example.in")).unwrap();
    let mut events = state.events().subscribe();

    state.account().logout().unwrap();

    assert!(!state.account().is_signed_in());
    assert!(state.session().customer_id().is_none());
    assert_eq!(state.account().remembered_user().as_deref(), Some("meera@example.in"));
    assert_eq!(
        drain(&mut events),
        vec![
            StoreEvent::CartChanged { count: 0 },
            StoreEvent::AuthChanged { signed_in: false },
        ]
    );
    assert_eq!(backend.total_hits(), 0);
}

// =============================================================================
// Registration and password reset
// =============================================================================

#[tokio::test]
async fn test_register_does_not_sign_in() {
    let backend = FakeBackend::start().await;
    backend.respond("POST", "customer", 200, ok(json!({ "id": 7 })));
    let state = backend.app_state();
    let form = RegisterForm {
        first_name: "Meera".to_string(),
        last_name: "Iyer".to_string(),
        email: "Meera@Example.in".to_string(),
        phone: "9876543210".to_string(),
        password: secret("handloom-42"),
        confirm_password: secret("handloom-42"),
        captcha_token: "captcha-ok".to_string(),
    };

    state.account().register(&form).await.unwrap();

    let body = backend.requests("POST", "customer")[0].body.clone().unwrap();
    assert_eq!(body["first_name"], "Meera");
    assert_eq!(body["captcha_token"], "captcha-ok");
    assert!(!state.session().is_authenticated());
}

#[tokio::test]
async fn test_password_reset_round() {
    let backend = FakeBackend::start().await;
    backend.respond("POST", "customer/forgot_password", 200, ok(json!(null)));
    backend.respond("PUT", "customer/reset_password/abc123", 200, ok(json!(null)));
    let account = backend.app_state().account().clone();

    account.request_password_reset("meera@example.in").await.unwrap();
    assert_eq!(
        backend.requests("POST", "customer/forgot_password")[0].body,
        Some(json!({ "email": "meera@example.in" }))
    );

    account
        .reset_password("abc123", &secret("new-weave-99"), &secret("new-weave-99"))
        .await
        .unwrap();
    assert_eq!(
        backend.requests("PUT", "customer/reset_password/abc123")[0].body,
        Some(json!({ "new_password": "new-weave-99", "confirm_password": "new-weave-99" }))
    );
}

#[tokio::test]
async fn test_reset_with_mismatched_confirmation_sends_nothing() {
    let backend = FakeBackend::start().await;
    let account = backend.app_state().account().clone();

    let err = account
        .reset_password("abc123", &secret("new-weave-99"), &secret("new-weave-98"))
        .await
        .unwrap_err();
    assert!(err.field_errors().unwrap().get(FormField::ConfirmPassword).is_some());
    assert_eq!(backend.total_hits(), 0);
}

// =============================================================================
// Password change
// =============================================================================

#[tokio::test]
async fn test_known_password_code_maps_to_field() {
    let backend = FakeBackend::start().await;
    backend.respond(
        "PUT",
        "customer/7/update_password",
        400,
        failure(1018, "Current password is incorrect"),
    );
    let state = backend.signed_in_state(7, "a1", Some("r1"));

    let err = state
        .account()
        .update_password(&secret("old-pass"), &secret("new-weave-99"), &secret("new-weave-99"))
        .await
        .unwrap_err();

    let fields = err.field_errors().unwrap();
    assert_eq!(
        fields.get(FormField::CurrentPassword),
        Some("Current password is incorrect")
    );
    assert_eq!(backend.hits("POST", "customer/refresh_token"), 0);
}

#[tokio::test]
async fn test_unknown_password_code_stays_a_banner() {
    let backend = FakeBackend::start().await;
    backend.respond(
        "PUT",
        "customer/7/update_password",
        200,
        failure(1099, "Too many attempts, try later"),
    );
    let state = backend.signed_in_state(7, "a1", Some("r1"));

    let err = state
        .account()
        .update_password(&secret("old-pass"), &secret("new-weave-99"), &secret("new-weave-99"))
        .await
        .unwrap_err();

    assert!(err.field_errors().is_none());
    assert_eq!(err.user_message(), "Too many attempts, try later");
}
