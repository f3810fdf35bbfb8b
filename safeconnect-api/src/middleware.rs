//! Rate limiting middleware for the phone verification routes.
//!
//! Each client IP gets its own token bucket so one caller cannot burn
//! through SMS credit or guess codes at speed.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::ApiError;

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    limiters: Arc<DashMap<IpAddr, Arc<DirectRateLimiter>>>,
}

impl RateLimitState {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config: Arc::new(config),
            limiters: Arc::new(DashMap::new()),
        }
    }

    fn limiter_for(&self, ip: IpAddr) -> Arc<DirectRateLimiter> {
        self.limiters
            .entry(ip)
            .or_insert_with(|| {
                let quota = Quota::per_minute(
                    NonZeroU32::new(self.config.otp_rate_limit_per_minute)
                        .unwrap_or(NonZeroU32::MIN),
                )
                .allow_burst(
                    NonZeroU32::new(self.config.otp_rate_limit_burst).unwrap_or(NonZeroU32::MIN),
                );
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// Number of client IPs with a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.limiters.len()
    }
}

/// Rejection for a client that exceeded its quota.
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Client IP, preferring proxy headers over the socket address.
fn client_ip(request: &Request, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Per-IP rate limit. Returns 429 with `retry-after` when exhausted.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request, connect_info.map(|ConnectInfo(addr)| addr));
    let limiter = state.limiter_for(ip);

    match limiter.check() {
        Ok(_) => {
            let mut response = next.run(request).await;
            if let Ok(limit) = HeaderValue::from_str(&state.config.otp_rate_limit_per_minute.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-ratelimit-limit"), limit);
            }
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            tracing::warn!(client_ip = %ip, retry_after, "Verification rate limit exceeded");
            Err(RateLimitError { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::post, Router};
    use tower::ServiceExt;

    fn config(enabled: bool) -> ApiConfig {
        ApiConfig {
            rate_limit_enabled: enabled,
            otp_rate_limit_per_minute: 5,
            otp_rate_limit_burst: 2,
            ..ApiConfig::default()
        }
    }

    fn app(state: RateLimitState) -> Router {
        Router::new()
            .route("/otp/send", post(|| async { "ok" }))
            .layer(from_fn_with_state(state, rate_limit_middleware))
    }

    fn request(ip: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/otp/send")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_burst_then_429() {
        let state = RateLimitState::new(config(true));
        let app = app(state.clone());

        for _ in 0..2 {
            let response = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        // A different client has its own bucket
        let response = app.oneshot(request("10.0.0.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.tracked_clients(), 2);
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let app = app(RateLimitState::new(config(false)));
        for _ in 0..5 {
            let response = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
