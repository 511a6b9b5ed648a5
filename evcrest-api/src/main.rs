//! evcrest gateway entry point
//!
//! Reads configuration, brings up the in-process cluster and serves the
//! cache API until interrupted.

use std::sync::Arc;

use axum::Router;
use evcrest_api::telemetry::{init_tracing, TelemetryConfig};
use evcrest_api::{create_router, ApiError, ApiResult, AppState, GatewayConfig};
use evcrest_storage::{ClientRegistry, InMemoryClientFactory, InMemoryCluster};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = GatewayConfig::from_env();
    let addr = config.bind_addr()?;

    let cluster = Arc::new(InMemoryCluster::new(config.server_groups));
    let factory = Arc::new(InMemoryClientFactory::new(Arc::clone(&cluster)));
    let registry = Arc::new(ClientRegistry::new(factory));
    let state = AppState::new(registry, cluster.server_groups());

    tracing::info!(
        %addr,
        server_groups = cluster.server_groups(),
        quorum_policy = ?state.coordinator.policy(),
        quorum_wait_ms = state.coordinator.wait().as_millis() as u64,
        max_body_bytes = config.max_body_bytes,
        environment = %config.environment,
        production = config.is_production(),
        "Starting evcrest gateway"
    );

    let app: Router = create_router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
