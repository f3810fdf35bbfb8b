//! REST API Routes Module
//!
//! Route handlers grouped by entity. Everything the mobile client calls
//! lives under `/api`; health probes, metrics and the OpenAPI document sit
//! at the root.

pub mod alert;
pub mod contact;
pub mod health;
pub mod journey;
pub mod otp;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware::{rate_limit_middleware, RateLimitState};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint. Swagger UI serves the same document
/// itself when enabled.
#[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed (development).
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Routes under `/api`, still needing the application state.
fn api_routes(api_config: &ApiConfig) -> Router<AppState> {
    let rate_limit_state = RateLimitState::new(api_config.clone());
    let verification = otp::create_router()
        .layer(from_fn_with_state(rate_limit_state, rate_limit_middleware));

    Router::new()
        .merge(user::create_router())
        .merge(contact::create_router())
        .merge(journey::create_router())
        .merge(alert::create_router())
        .merge(verification)
}

/// Create the complete API router.
///
/// - REST routes under `/api/*`, with the verification routes rate limited per IP
/// - Health checks at `/health/*`
/// - Metrics at `/metrics`
/// - OpenAPI spec at `/openapi.json` and Swagger UI at `/swagger-ui` when enabled
///
/// Execution order: CORS -> Trace -> Observability -> Handler
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .nest("/api", api_routes(api_config))
        .nest("/health", health::create_router())
        .with_state(state)
        .route("/metrics", get(metrics_handler));

    #[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/openapi.json", crate::openapi::ApiDoc::openapi()),
        );
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
}
