//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a tracing span, records Prometheus metrics and
//! logs completion. Metrics are labelled with the matched route template
//! rather than the raw path, so tenant ids and keys never become labels.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Some(metrics) = metrics() {
        metrics.record_http_request(
            method.as_str(),
            &route,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    tracing::info!(
        method = %method,
        path = %path,
        route = %route,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/items/:id", get(|| async { "ok" }))
            .layer(from_fn(observability_middleware))
    }

    #[tokio::test]
    async fn test_matched_route_is_recorded() -> Result<(), String> {
        let request = Request::builder()
            .uri("/items/42")
            .body(Body::empty())
            .map_err(|e| format!("Failed to build request: {}", e))?;

        let response = app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);

        let metrics = metrics().ok_or("metrics not registered")?;
        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/items/:id", "200"])
            .get();
        assert!(count >= 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_route_label_falls_back_when_unmatched() -> Result<(), String> {
        let request = Request::builder()
            .uri("/nowhere")
            .body(Body::empty())
            .map_err(|e| format!("Failed to build request: {}", e))?;
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
        Ok(())
    }
}
