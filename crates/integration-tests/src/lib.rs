//! Test harness for the Craftmart storefront client.
//!
//! [`FakeBackend`] is an axum server on `127.0.0.1:0` that answers every
//! route from a script. Tests script responses per `METHOD path`, run the
//! storefront against it, then assert on the recorded requests.
//!
//! ```rust,ignore
//! let backend = FakeBackend::start().await;
//! backend.respond("GET", "master/countries", 200, ok(json!([{"id": 1, "name": "India"}])));
//! let state = backend.app_state();
//! // ...
//! assert_eq!(backend.hits("GET", "master/countries"), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use craftmart_core::CustomerId;
use craftmart_storefront::config::StorefrontConfig;
use craftmart_storefront::events::StoreEvent;
use craftmart_storefront::session::{AuthTokens, Session};
use craftmart_storefront::state::AppState;

/// Success envelope around `data`.
#[must_use]
pub fn ok(data: Value) -> Value {
    json!({ "ack": "success", "data": data })
}

/// Failure envelope with a backend error code.
#[must_use]
pub fn failure(code: i64, message: &str) -> Value {
    json!({ "ack": "failure", "error": { "code": code, "message": message } })
}

/// Every event already published to `rx`.
pub fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A scripted reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl Reply {
    #[must_use]
    pub const fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
        }
    }

    /// Hold the reply back for `delay` before sending it.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the backend saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    /// Replies used once each, in order, before the sticky reply.
    once: VecDeque<Reply>,
    sticky: Option<Reply>,
}

#[derive(Default)]
struct BackendState {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<HashMap<String, Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), path.trim_start_matches('/'))
}

/// In-process stand-in for the storefront backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL to point the storefront at.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Storefront configuration aimed at this backend.
    ///
    /// # Panics
    ///
    /// Panics if the base URL is rejected, which would be a harness bug.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::for_api_base(&self.base_url()).expect("Fake backend URL is valid")
    }

    /// Fresh app state over an in-memory session.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState::with_session(self.config(), Session::in_memory())
    }

    /// App state already signed in as `customer` with the given tokens.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory session cannot be written.
    #[must_use]
    pub fn signed_in_state(&self, customer: i64, access: &str, refresh: Option<&str>) -> AppState {
        let state = self.app_state();
        let session = state.session();
        session
            .store_tokens(&AuthTokens {
                access_token: access.to_string().into(),
                refresh_token: refresh.map(|r| r.to_string().into()),
            })
            .expect("In-memory session write");
        session
            .set_customer_id(CustomerId::new(customer))
            .expect("In-memory session write");
        state
    }

    /// Always answer `method path` with `status` and `body`.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.respond_with(method, path, Reply::new(status, body));
    }

    /// Always answer `method path` with `reply`.
    pub fn respond_with(&self, method: &str, path: &str, reply: Reply) {
        lock(&self.state.scripts)
            .entry(route_key(method, path))
            .or_default()
            .sticky = Some(reply);
    }

    /// Answer the next `method path` request with `status` and `body`, then
    /// fall back to the sticky reply.
    pub fn respond_once(&self, method: &str, path: &str, status: u16, body: Value) {
        lock(&self.state.scripts)
            .entry(route_key(method, path))
            .or_default()
            .once
            .push_back(Reply::new(status, body));
    }

    /// Number of requests received for `method path`.
    #[must_use]
    pub fn hits(&self, method: &str, path: &str) -> usize {
        lock(&self.state.requests)
            .get(&route_key(method, path))
            .map_or(0, Vec::len)
    }

    /// Total requests received on any route.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        lock(&self.state.requests).values().map(Vec::len).sum()
    }

    /// Requests received for `method path`, oldest first.
    #[must_use]
    pub fn requests(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        lock(&self.state.requests)
            .get(&route_key(method, path))
            .cloned()
            .unwrap_or_default()
    }

    /// Forget recorded requests, keeping the script.
    pub fn reset_hits(&self) {
        lock(&self.state.requests).clear();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = path.strip_prefix("api/").unwrap_or(path);
    let key = route_key(method.as_str(), path);

    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let recorded = RecordedRequest {
        query: uri.query().map(str::to_string),
        bearer,
        body: serde_json::from_slice(&body).ok(),
    };
    lock(&state.requests).entry(key.clone()).or_default().push(recorded);

    let reply = {
        let mut scripts = lock(&state.scripts);
        scripts
            .get_mut(&key)
            .and_then(|script| script.once.pop_front().or_else(|| script.sticky.clone()))
    };

    let Some(reply) = reply else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(failure(404, &format!("No route for {key}"))),
        )
            .into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(reply.body)).into_response()
}

/// Canned backend payloads shared by the tests.
pub mod fixtures {
    use serde_json::{Value, json};

    /// Cart 5 for customer 7: two throws at ₹100 (stock 2) and one cup at ₹50.
    #[must_use]
    pub fn cart() -> Value {
        json!({
            "id": 5,
            "customer_id": 7,
            "items": [
                {
                    "id": 11,
                    "quantity": 2,
                    "product": { "id": 101, "title": "Kantha throw", "actual_price": 100, "stock": 2 }
                },
                {
                    "id": 12,
                    "quantity": 1,
                    "product": { "id": 102, "title": "Clay cup", "actual_price": 50 }
                }
            ]
        })
    }

    /// Saved-for-later entry for `product_id`.
    #[must_use]
    pub fn saved(saved_id: i64, product_id: i64, title: &str) -> Value {
        json!({
            "id": saved_id,
            "product_id": product_id,
            "product": { "id": product_id, "title": title, "actual_price": 100 }
        })
    }

    /// A saved address in Madurai.
    #[must_use]
    pub fn address(id: i64, pincode: &str, is_default: bool) -> Value {
        json!({
            "id": id,
            "recipient_name": "Meera Iyer",
            "contact": "9876543210",
            "line1": "4 Handloom Street",
            "country_id": 1,
            "country_name": "India",
            "state_id": 33,
            "state_name": "Tamil Nadu",
            "city_id": 7,
            "city_name": "Madurai",
            "pincode": pincode,
            "is_default": is_default
        })
    }
}
