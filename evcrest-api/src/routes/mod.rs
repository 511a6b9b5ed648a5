//! REST API Routes Module
//!
//! Includes:
//! - Cache store/fetch/remove under `/evcrest/v1.0`
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document

pub mod cache;
pub mod health;

use axum::{
    extract::DefaultBodyLimit, middleware::from_fn, response::IntoResponse, routing::get, Json,
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

use crate::config::GatewayConfig;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use cache::create_router as cache_router;
pub use health::create_router as health_router;

/// Prefix every cache route is served under.
pub const CACHE_PREFIX: &str = "/evcrest/v1.0";

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the gateway router.
///
/// The body limit replaces axum's default so oversized payloads are
/// answered with 413 before a handler runs.
pub fn create_router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .nest(CACHE_PREFIX, cache_router())
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(from_fn(observability_middleware))
}
