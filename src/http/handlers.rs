//! Request handlers for the lookup endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::config::RateLimitingConfig;
use crate::dataset::Dataset;
use crate::error::TurnstileError;
use crate::ratelimit::{LimiterRegistry, Verdict};

/// Key charged when the request carries no identity header. All
/// unidentified clients share this quota rather than bypassing limits.
const ANONYMOUS_KEY: &str = "anonymous";

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Registry holding the process-wide limiter
    pub registry: Arc<LimiterRegistry>,
    /// Settings used by whichever request initializes the limiter first
    pub limiter_settings: RateLimitingConfig,
    /// Name of the trusted source-address header
    pub identity_header: String,
    /// The immutable record table
    pub dataset: Arc<Dataset>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/items/{id}", get(get_item))
        .with_state(state)
}

/// `GET /items/{id}`: rate-limit the caller, then look up the record.
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let key = client_key(&headers, &state.identity_header);

    let limiter = match state.registry.get_or_init(&state.limiter_settings).await {
        Ok(limiter) => limiter,
        Err(e) => {
            error!(error = %e, "Failed to initialize rate limiter");
            return unavailable_response();
        }
    };

    match limiter.limit(&key).await {
        Ok(verdict) if verdict.allowed => {
            let record = state.dataset.lookup(&id);
            (StatusCode::OK, quota_headers(&verdict), Json(record)).into_response()
        }
        Ok(verdict) => {
            let retry_after = (verdict.reset_at - Utc::now()).num_seconds().max(1);
            let mut headers = quota_headers(&verdict).to_vec();
            headers.push(("retry-after", retry_after.to_string()));
            (
                StatusCode::TOO_MANY_REQUESTS,
                AppendHeaders(headers),
                Json(json!({ "error": "Too many requests" })),
            )
                .into_response()
        }
        // Fail closed, but distinguishable from user-caused limiting.
        Err(TurnstileError::UpstreamUnavailable(e)) => {
            warn!(key = %key, error = %e, "Denying request, counter store unavailable");
            unavailable_response()
        }
        Err(e) => {
            error!(key = %key, error = %e, "Rate limit check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal error" })),
            )
                .into_response()
        }
    }
}

/// Quota hint headers attached to limited responses.
fn quota_headers(verdict: &Verdict) -> [(&'static str, String); 3] {
    [
        ("x-ratelimit-limit", verdict.limit.to_string()),
        ("x-ratelimit-remaining", verdict.remaining.to_string()),
        ("x-ratelimit-reset", verdict.reset_at.timestamp().to_string()),
    ]
}

fn unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Rate limiter unavailable" })),
    )
        .into_response()
}

/// Resolve the rate-limited principal from the trusted source-address
/// header. The header may carry a comma-separated list; the first element
/// is the client.
fn client_key(headers: &HeaderMap, identity_header: &str) -> String {
    headers
        .get(identity_header)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS_KEY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{RateLimiter, WindowConfig};
    use crate::store::{CounterStore, WindowSample};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn increment(
            &self,
            _key: &str,
            _now_ms: i64,
            _config: &WindowConfig,
        ) -> crate::error::Result<WindowSample> {
            Err(TurnstileError::UpstreamUnavailable(
                "connection refused".to_string(),
            ))
        }
    }

    fn test_state(max_requests: u64) -> AppState {
        AppState {
            registry: Arc::new(LimiterRegistry::new()),
            limiter_settings: RateLimitingConfig {
                max_requests,
                window_secs: 10,
                ..Default::default()
            },
            identity_header: "x-forwarded-for".to_string(),
            dataset: Arc::new(Dataset::builtin()),
        }
    }

    async fn send(router: &Router, uri: &str, client: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri(uri);
        if let Some(client) = client {
            request = request.header("x-forwarded-for", client);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_lookup_returns_record() {
        let router = router(test_state(4));
        let (status, body) = send(&router, "/items/1", Some("1.2.3.4")).await;

        assert_eq!(status, StatusCode::OK);
        let record: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(record["title"], "Water the plants");
    }

    #[tokio::test]
    async fn test_out_of_range_id_returns_placeholder_not_error() {
        let router = router(test_state(4));
        let (status, body) = send(&router, "/items/99", Some("1.2.3.4")).await;

        assert_eq!(status, StatusCode::OK);
        let record: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(record, Dataset::placeholder());
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let router = router(test_state(4));
        let (_, first) = send(&router, "/items/2", Some("1.2.3.4")).await;
        let (_, second) = send(&router, "/items/2", Some("1.2.3.4")).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fifth_request_in_window_is_limited() {
        let router = router(test_state(4));

        for _ in 0..4 {
            let (status, _) = send(&router, "/items/0", Some("1.2.3.4")).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&router, "/items/0", Some("1.2.3.4")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error, json!({ "error": "Too many requests" }));
    }

    #[tokio::test]
    async fn test_other_clients_keep_their_quota() {
        let router = router(test_state(4));

        for _ in 0..5 {
            send(&router, "/items/0", Some("1.2.3.4")).await;
        }
        let (status, _) = send(&router, "/items/0", Some("5.6.7.8")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_headerless_clients_share_anonymous_quota() {
        let router = router(test_state(2));

        // Two distinct header-less clients are indistinguishable and
        // draw down one shared quota.
        assert_eq!(send(&router, "/items/0", None).await.0, StatusCode::OK);
        assert_eq!(send(&router, "/items/0", None).await.0, StatusCode::OK);
        assert_eq!(
            send(&router, "/items/0", None).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_limited_response_carries_quota_headers() {
        let router = router(test_state(1));

        let request = Request::builder()
            .uri("/items/0")
            .header("x-forwarded-for", "1.2.3.4")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-ratelimit-limit"], "1");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let request = Request::builder()
            .uri("/items/0")
            .header("x-forwarded-for", "1.2.3.4")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed_with_503() {
        let limiter = Arc::new(RateLimiter::new(
            WindowConfig::new(4, Duration::from_secs(10)),
            Arc::new(UnreachableStore),
            Duration::from_secs(1),
        ));
        let mut state = test_state(4);
        state.registry = Arc::new(LimiterRegistry::with_limiter(limiter));
        let router = router(state);

        let (status, body) = send(&router, "/items/0", Some("1.2.3.4")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error, json!({ "error": "Rate limiter unavailable" }));
    }

    #[test]
    fn test_client_key_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, "x-forwarded-for"), "9.9.9.9");
    }

    #[test]
    fn test_client_key_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(client_key(&headers, "x-forwarded-for"), ANONYMOUS_KEY);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "   ".parse().unwrap());
        assert_eq!(client_key(&headers, "x-forwarded-for"), ANONYMOUS_KEY);
    }

    // The memory store admits a shared-quota scenario end to end; make
    // sure the handler path also exercises it through the default
    // registry initialization.
    #[tokio::test]
    async fn test_registry_initialized_by_first_request_uses_memory_store() {
        let state = test_state(4);
        let router = router(state.clone());

        let (status, _) = send(&router, "/items/0", Some("1.2.3.4")).await;
        assert_eq!(status, StatusCode::OK);

        // Later settings are ignored; the limiter built by the first
        // request stays in place.
        let limiter = state
            .registry
            .get_or_init(&RateLimitingConfig {
                max_requests: 999,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limiter.config().max_requests, 4);
    }
}
