//! OpenAPI Specification for the evcrest gateway
//!
//! Generated with utoipa from the route annotations and served at
//! `/openapi.json`.

use utoipa::OpenApi;

use crate::routes::{cache, health};
use crate::telemetry::metrics;

/// OpenAPI document for the evcrest gateway.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "evcrest gateway",
        version = "0.1.0",
        description = "REST gateway to a replicated cache cluster with per-tenant clients and quorum-acknowledged writes",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Cache", description = "Store, fetch and remove keys for an application"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Cache Routes ===
        cache::store,
        cache::store_put,
        cache::fetch,
        cache::remove,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,

        // === Observability ===
        metrics::metrics_handler,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::HealthStatus,
            health::HealthDetails,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
