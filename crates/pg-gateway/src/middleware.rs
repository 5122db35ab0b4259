//! HTTP middleware stack, grounded directly on the teacher's
//! `abp-daemon::middleware` pair-of-layers shape: a request-id stamp, a
//! structured request logger, a generic sliding-window rate limiter, and a
//! CORS layer built from configuration.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// A unique per-request identifier, available as an axum extension and
/// stamped onto the `X-Request-Id` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

/// Generates a [`RequestId`] for each request and sets `X-Request-Id`.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(id);
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

/// Logs method, path, status, and duration for each request as a single
/// structured `tracing` event.
pub struct RequestLogger;

impl RequestLogger {
    /// Axum-compatible handler function.
    pub async fn layer(req: Request, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        let resp = next.run(req).await;

        let duration = start.elapsed();
        let status = resp.status().as_u16();

        info!(
            http.method = %method,
            http.path = %path,
            http.status = status,
            http.duration_ms = duration.as_millis() as u64,
            "request completed"
        );

        resp
    }
}

/// In-memory sliding-window rate limiter guarding the whole HTTP surface
/// (distinct from `pg_skills::RateLimiter`, which gates proof generation
/// specifically and is keyed by signer address rather than by connection).
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    max_requests: u32,
    window: Duration,
}

struct RateLimiterInner {
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    /// Allow `max_requests` within a sliding `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner { timestamps: VecDeque::new() })), max_requests, window }
    }

    /// Check admission, recording the attempt if it's allowed.
    pub async fn check(&self) -> Result<(), StatusCode> {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;

        while let Some(&front) = guard.timestamps.front() {
            if now.duration_since(front) > self.window {
                guard.timestamps.pop_front();
            } else {
                break;
            }
        }

        if guard.timestamps.len() as u32 >= self.max_requests {
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }

        guard.timestamps.push_back(now);
        Ok(())
    }

    /// Build a Tower [`Layer`](tower::Layer) from this limiter.
    pub fn into_layer(self) -> RateLimiterLayer {
        RateLimiterLayer(self)
    }
}

/// Tower [`Layer`] wrapping services with [`RateLimiter`] enforcement.
#[derive(Clone)]
pub struct RateLimiterLayer(RateLimiter);

impl<S: Clone> tower::Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterService { limiter: self.0.clone(), inner }
    }
}

/// Tower [`Service`] enforcing rate limiting before forwarding to the inner
/// service.
#[derive(Clone)]
pub struct RateLimiterService<S> {
    limiter: RateLimiter,
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RateLimiterService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: IntoResponse,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if let Err(status) = limiter.check().await {
                return Ok((status, "too many requests").into_response());
            }
            inner.call(req).await
        })
    }
}

/// CORS configuration for the A2A and discovery routes.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origin list; `["*"]` permits every origin.
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods.
    pub allowed_methods: Vec<String>,
    /// Allowed request headers.
    pub allowed_headers: Vec<String>,
}

impl CorsConfig {
    /// Build from the gateway's parsed CORS origin list, with the fixed
    /// method/header set every route here actually uses.
    pub fn from_origins(origins: Vec<String>) -> Self {
        Self {
            allowed_origins: origins,
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec![
                "content-type".to_string(),
                "authorization".to_string(),
                "x-payment".to_string(),
                "payment-signature".to_string(),
            ],
        }
    }

    /// Convert into a [`tower_http::cors::CorsLayer`].
    pub fn to_cors_layer(&self) -> CorsLayer {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return CorsLayer::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any());
        }

        let origins: Vec<HeaderValue> = self.allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
        let methods: Vec<axum::http::Method> = self.allowed_methods.iter().filter_map(|m| m.parse().ok()).collect();
        let headers: Vec<axum::http::HeaderName> = self.allowed_headers.iter().filter_map(|h| h.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::list(methods))
            .allow_headers(AllowHeaders::list(headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
        assert_eq!(limiter.check().await.unwrap_err(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn rate_limiter_expires_old_timestamps_outside_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check().await.is_ok());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check().await.is_ok());
    }

    #[test]
    fn wildcard_cors_config_builds_a_permissive_layer() {
        let config = CorsConfig::from_origins(vec!["*".to_string()]);
        let _layer = config.to_cors_layer();
    }
}
