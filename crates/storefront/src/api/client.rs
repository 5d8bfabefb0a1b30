//! HTTP client wrapper: bearer auth, one silent token refresh, tolerant JSON.

use std::sync::{Arc, LazyLock};

use moka::future::Cache;
use regex::Regex;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::StorefrontConfig;
use crate::events::{EventBus, Route, StoreEvent};
use crate::session::{AuthTokens, Session};

use super::cache::{CacheKey, CacheValue};
use super::endpoints;
use super::types::{Envelope, RefreshRequest, TokenData};
use super::ApiError;

/// 4xx messages the backend uses for an expired or invalid token.
static AUTH_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)invalid token|expired|unauthori[sz]ed").expect("Invalid regex")
});

/// Body and status of a response whose JSON was parsed leniently.
struct RawResponse {
    status: StatusCode,
    body: Option<Value>,
}

impl RawResponse {
    /// Message from `error.message`, `message` or `msg`.
    fn message(&self) -> Option<&str> {
        let body = self.body.as_ref()?;
        body.pointer("/error/message")
            .or_else(|| body.get("message"))
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
    }

    fn code(&self) -> Option<i64> {
        let code = self.body.as_ref()?.pointer("/error/code")?;
        code.as_i64()
            .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()))
    }

    /// A 401, or a 400/403/422 whose message says the token is bad.
    fn is_auth_failure(&self) -> bool {
        match self.status {
            StatusCode::UNAUTHORIZED => true,
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
                self.message().is_some_and(|m| AUTH_MESSAGE_RE.is_match(m))
            }
            _ => false,
        }
    }

    fn into_result(self) -> Result<Option<Value>, ApiError> {
        if self.status.is_success() {
            return Ok(self.body);
        }
        let message = self
            .message()
            .map(str::to_string)
            .or_else(|| self.status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        Err(ApiError::Api {
            status: self.status.as_u16(),
            code: self.code(),
            message,
            body: self.body.map(Box::new),
        })
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend.
///
/// Attaches the stored bearer token to every request. When a request that
/// carried a token is rejected as unauthenticated, the client refreshes the
/// token once and retries once; if that fails the stored credentials are
/// cleared and the shopper is sent to the login page.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: Url,
    session: Session,
    events: EventBus,
    cache: Cache<CacheKey, CacheValue>,
    /// Serializes refreshes so concurrent 401s exchange the token once.
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    #[must_use]
    pub fn new(config: &StorefrontConfig, session: Session, events: EventBus) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base: config.api_base.clone(),
                session,
                events,
                cache,
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Session the client reads tokens from.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Event bus auth changes are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub(crate) fn cache(&self) -> &Cache<CacheKey, CacheValue> {
        &self.inner.cache
    }

    /// Resolve `path` against the API base.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Url` if the path cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base.join(path.trim_start_matches('/'))?)
    }

    // =========================================================================
    // Raw JSON
    // =========================================================================

    /// `GET path`, returning the parsed body (`None` if empty or not JSON).
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or expired auth.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.send(Method::GET, path, None).await
    }

    /// `GET path` with query parameters appended.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or expired auth.
    pub async fn get_with_query(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<Value>, ApiError> {
        let mut url = self.url(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        self.send_url(Method::GET, url, None).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or expired auth.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(&body)).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or expired auth.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(&body)).await
    }

    /// `DELETE path`, optionally with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or expired auth.
    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<Option<Value>, ApiError> {
        self.send(Method::DELETE, path, body).await
    }

    // =========================================================================
    // Typed envelope helpers
    // =========================================================================

    /// `GET` and decode `data` from the response envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend rejects it or the
    /// body does not decode.
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(self.get(path).await?)
    }

    /// `GET` with query parameters and decode `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend rejects it or the
    /// body does not decode.
    pub async fn get_data_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        decode(self.get_with_query(path, params).await?)
    }

    /// `GET` and decode `data`, which the backend may send as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend rejects it or the
    /// body does not decode.
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        match self.get(path).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value::<Envelope<T>>(value)?.into_optional(),
        }
    }

    /// `POST` and decode `data` from the response envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend rejects it or the
    /// body does not decode.
    pub async fn post_data<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.post(path, body).await?)
    }

    /// Check the envelope of a response whose payload is not needed.
    ///
    /// An empty body counts as success; `ack: "failure"` does not.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for a failure envelope.
    pub fn expect_ack(body: Option<Value>) -> Result<(), ApiError> {
        match body {
            None => Ok(()),
            Some(value) => {
                let envelope: Envelope<Value> = serde_json::from_value(value)?;
                envelope.into_optional().map(|_| ())
            }
        }
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.url(path)?;
        self.send_url(method, url, body).await
    }

    #[instrument(skip(self, body), fields(method = %method, path = %url.path()))]
    async fn send_url(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let sent_token = self.inner.session.access_token();
        let response = self
            .dispatch(method.clone(), url.clone(), body, sent_token.as_ref())
            .await?;

        if !response.is_auth_failure() {
            return response.into_result();
        }
        // Nothing to refresh. Credentials left over from a half-cleared
        // session are dropped so the shopper signs in again.
        if sent_token.is_none() {
            if self.has_stale_credentials() {
                warn!("Unauthenticated request rejected with stale credentials stored");
                self.expire_session();
                return Err(ApiError::AuthRequired);
            }
            return response.into_result();
        }

        debug!(status = %response.status, "Token rejected, attempting refresh");
        if !self.refresh(sent_token.as_ref()).await {
            self.expire_session();
            return Err(ApiError::AuthRequired);
        }

        let retry_token = self.inner.session.access_token();
        let retry = self
            .dispatch(method, url, body, retry_token.as_ref())
            .await?;
        if retry.is_auth_failure() {
            warn!("Request rejected again after token refresh");
            self.expire_session();
            return Err(ApiError::AuthRequired);
        }
        retry.into_result()
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        token: Option<&SecretString>,
    ) -> Result<RawResponse, ApiError> {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok(RawResponse {
            status,
            body: parse_lenient(&text),
        })
    }

    /// Exchange the stored refresh token for new tokens.
    ///
    /// Returns `true` if a usable access token is now stored. If another
    /// request already refreshed while this one waited, no call is made.
    async fn refresh(&self, rejected: Option<&SecretString>) -> bool {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.inner.session.access_token();
        if let (Some(current), Some(rejected)) = (&current, rejected)
            && current.expose_secret() != rejected.expose_secret()
        {
            debug!("Token already refreshed by a concurrent request");
            return true;
        }

        let Some(refresh_token) = self.inner.session.refresh_token() else {
            debug!("No refresh token stored");
            return false;
        };

        match self.request_refresh(&refresh_token).await {
            Ok(tokens) => {
                let stored = AuthTokens {
                    access_token: SecretString::from(tokens.access_token),
                    refresh_token: tokens.refresh_token.map(SecretString::from),
                };
                if let Err(e) = self.inner.session.store_tokens(&stored) {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                    return false;
                }
                if let Some(customer_id) = tokens.customer_id
                    && let Err(e) = self.inner.session.set_customer_id(customer_id)
                {
                    warn!(error = %e, "Failed to persist customer id");
                }
                debug!("Access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    #[instrument(skip_all)]
    async fn request_refresh(&self, refresh_token: &SecretString) -> Result<TokenData, ApiError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        })?;
        let url = self.url(endpoints::REFRESH_TOKEN)?;
        let response = self.dispatch(Method::POST, url, Some(&body), None).await?;
        decode(response.into_result()?)
    }

    /// Forget the shopper and send them to the login page.
    /// A refresh token or customer id is stored without an access token.
    fn has_stale_credentials(&self) -> bool {
        let session = &self.inner.session;
        session.access_token().is_none()
            && (session.refresh_token().is_some() || session.customer_id().is_some())
    }

    fn expire_session(&self) {
        if let Err(e) = self.inner.session.clear_auth() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.inner
            .events
            .publish(StoreEvent::AuthChanged { signed_in: false });
        self.inner.events.navigate(Route::Login);
    }
}

/// Parse a response body, treating empty or non-JSON text as no body.
fn parse_lenient(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(
                error = %e,
                body = %text.chars().take(200).collect::<String>(),
                "Response body is not JSON"
            );
            None
        }
    }
}

/// Decode `data` from an envelope body.
fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T, ApiError> {
    let value = body.ok_or(ApiError::EmptyBody)?;
    let envelope: Envelope<T> = serde_json::from_value(value)?;
    envelope.into_data()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: Some(body),
        }
    }

    #[test]
    fn test_401_is_auth_failure() {
        assert!(
            RawResponse {
                status: StatusCode::UNAUTHORIZED,
                body: None
            }
            .is_auth_failure()
        );
    }

    #[test]
    fn test_token_messages_on_other_4xx() {
        assert!(raw(403, json!({ "error": { "message": "Token Expired" } })).is_auth_failure());
        assert!(raw(400, json!({ "message": "invalid token" })).is_auth_failure());
        assert!(raw(422, json!({ "msg": "Unauthorised access" })).is_auth_failure());
        assert!(!raw(400, json!({ "message": "Quantity exceeds stock" })).is_auth_failure());
        assert!(!raw(404, json!({ "message": "expired" })).is_auth_failure());
    }

    #[test]
    fn test_error_status_carries_code_and_message() {
        let err = raw(409, json!({ "error": { "code": "1003", "message": "Duplicate" } }))
            .into_result()
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Api { status: 409, code: Some(1003), ref message, .. } if message == "Duplicate"
        ));
        assert_eq!(err.body().unwrap().pointer("/error/code"), Some(&json!("1003")));
    }

    #[test]
    fn test_parse_lenient() {
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("<html>Bad Gateway</html>").is_none());
        assert_eq!(parse_lenient("{\"a\":1}"), Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_expect_ack() {
        assert!(ApiClient::expect_ack(None).is_ok());
        assert!(ApiClient::expect_ack(Some(json!({ "ack": "success" }))).is_ok());
        assert!(ApiClient::expect_ack(Some(json!({ "ack": "failure" }))).is_err());
    }

    #[test]
    fn test_url_joins_under_base_path() {
        let config = StorefrontConfig::for_api_base("https://api.example.in/v1").unwrap();
        let client = ApiClient::new(&config, Session::in_memory(), EventBus::default());
        assert_eq!(
            client.url("/cart").unwrap().as_str(),
            "https://api.example.in/v1/cart"
        );
        assert_eq!(
            client.url(&endpoints::states(craftmart_core::CountryId::new(1))).unwrap().as_str(),
            "https://api.example.in/v1/master/states?country_id=1"
        );
    }
}
