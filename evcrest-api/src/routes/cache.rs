//! Cache REST API Routes
//!
//! Store, fetch and remove a tenant's keys under `/evcrest/v1.0/{app_id}/{key}`.
//! Writes are fanned out by the [`QuorumCoordinator`]; fetch and remove go
//! straight to the tenant's cache client.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use evcrest_core::{
    CacheOperation, CacheValue, GatewayResult, TenantId, WriteOutcome, WriteRequest,
};
use evcrest_storage::{ClientHandle, ClientRegistry, QuorumCoordinator};
use serde::Deserialize;
use tracing::{info_span, Instrument};
use utoipa::IntoParams;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    telemetry::metrics,
};

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Query parameters accepted by store.
///
/// Both are taken as raw strings so a malformed value is reported with the
/// key it belongs to instead of as a generic query rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoreParams {
    /// Time to live in seconds. Required, must be positive.
    pub ttl: Option<String>,
    /// Opaque integer stored alongside the payload.
    pub flag: Option<String>,
}

// ============================================================================
// RESPONSE MESSAGES
// ============================================================================

fn stored_message(key: &str, outcome: WriteOutcome) -> Option<String> {
    match outcome {
        WriteOutcome::Complete => Some(format!("Set Operation for Key - {} was successful. \n", key)),
        WriteOutcome::PartialSuccess(n) => Some(format!(
            "Set Operation for Key - {} was successful in {} Server Groups. \n",
            key, n
        )),
        WriteOutcome::Failure => None,
    }
}

fn deleted_message(key: &str) -> String {
    format!("Deleted Operation for Key - {} was successful. \n", key)
}

fn record_cache_operation(operation: CacheOperation, success: bool) {
    if let Some(metrics) = metrics() {
        metrics.record_cache_operation(operation, success);
    }
}

// ============================================================================
// CACHE OPERATIONS
// ============================================================================

/// Resolve the tenant's client. The tenant gauge moves only when this call
/// built the client.
async fn resolve_client(
    registry: &ClientRegistry,
    tenant: &TenantId,
) -> GatewayResult<ClientHandle> {
    let resolution = registry.resolve_with_status(tenant).await?;
    if resolution.built {
        if let Some(metrics) = metrics() {
            metrics.set_registered_tenants(registry.len());
        }
    }
    Ok(resolution.handle)
}

async fn write_value(
    registry: &ClientRegistry,
    coordinator: &QuorumCoordinator,
    request: &WriteRequest,
) -> GatewayResult<WriteOutcome> {
    let client = resolve_client(registry, &request.tenant).await?;

    let result = coordinator.write(client.as_ref(), request).await;
    record_cache_operation(CacheOperation::Write, result.is_ok());
    let outcome = result?;
    if let Some(metrics) = metrics() {
        metrics.record_write_outcome(outcome);
    }
    Ok(outcome)
}

async fn read_value(
    registry: &ClientRegistry,
    tenant: &TenantId,
    key: &str,
) -> GatewayResult<Option<CacheValue>> {
    let client = resolve_client(registry, tenant).await?;

    let result = client.read(key).await;
    record_cache_operation(CacheOperation::Read, result.is_ok());
    Ok(result?)
}

/// Submit the delete and return how many server groups it targeted.
async fn delete_value(
    registry: &ClientRegistry,
    tenant: &TenantId,
    key: &str,
) -> GatewayResult<usize> {
    let client = resolve_client(registry, tenant).await?;

    let result = client.delete(key).await;
    record_cache_operation(CacheOperation::Delete, result.is_ok());
    Ok(result?.map(|latch| latch.targeted()).unwrap_or(0))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /evcrest/v1.0/{app_id}/{key} - Store a value
#[utoipa::path(
    post,
    path = "/evcrest/v1.0/{app_id}/{key}",
    tag = "Cache",
    params(
        ("app_id" = String, Path, description = "Application id, case-insensitive"),
        ("key" = String, Path, description = "Cache key"),
        StoreParams
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Stored on all required server groups, or on some of them", body = String),
        (status = 400, description = "Missing or invalid ttl, or malformed flag", body = String),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "No server group acknowledged the write"),
    ),
)]
pub async fn store(
    State(registry): State<Arc<ClientRegistry>>,
    State(coordinator): State<QuorumCoordinator>,
    Path((app_id, key)): Path<(String, String)>,
    Query(params): Query<StoreParams>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    store_value(&registry, &coordinator, &app_id, key, params, body).await
}

/// PUT /evcrest/v1.0/{app_id}/{key} - Store a value
#[utoipa::path(
    put,
    path = "/evcrest/v1.0/{app_id}/{key}",
    tag = "Cache",
    params(
        ("app_id" = String, Path, description = "Application id, case-insensitive"),
        ("key" = String, Path, description = "Cache key"),
        StoreParams
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Stored on all required server groups, or on some of them", body = String),
        (status = 400, description = "Missing or invalid ttl, or malformed flag", body = String),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "No server group acknowledged the write"),
    ),
)]
pub async fn store_put(
    State(registry): State<Arc<ClientRegistry>>,
    State(coordinator): State<QuorumCoordinator>,
    Path((app_id, key)): Path<(String, String)>,
    Query(params): Query<StoreParams>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    store_value(&registry, &coordinator, &app_id, key, params, body).await
}

async fn store_value(
    registry: &ClientRegistry,
    coordinator: &QuorumCoordinator,
    app_id: &str,
    key: String,
    params: StoreParams,
    body: Bytes,
) -> ApiResult<(StatusCode, String)> {
    // Input is checked before any client is built or any write is issued.
    let request = WriteRequest::parse(
        app_id,
        key,
        body,
        params.ttl.as_deref(),
        params.flag.as_deref(),
    )?;

    let span = info_span!("cache_store", tenant = %request.tenant, key = %request.key);
    async move {
        let outcome = write_value(registry, coordinator, &request).await?;

        stored_message(&request.key, outcome)
            .map(|message| (StatusCode::OK, message))
            .ok_or_else(|| ApiError::write_failed(&request.key, &request.tenant))
    }
    .instrument(span)
    .await
}

/// GET /evcrest/v1.0/{app_id}/{key} - Fetch a value
#[utoipa::path(
    get,
    path = "/evcrest/v1.0/{app_id}/{key}",
    tag = "Cache",
    params(
        ("app_id" = String, Path, description = "Application id, case-insensitive"),
        ("key" = String, Path, description = "Cache key"),
    ),
    responses(
        (status = 200, description = "The stored payload", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "Key not cached, or cached with an empty payload", body = String),
        (status = 500, description = "Cache read failed"),
    ),
)]
pub async fn fetch(
    State(registry): State<Arc<ClientRegistry>>,
    Path((app_id, key)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let tenant = TenantId::parse(&app_id)?;

    let span = info_span!("cache_fetch", tenant = %tenant, key = %key);
    async move {
        match read_value(&registry, &tenant, &key).await? {
            Some(value) if !value.is_empty() => {
                tracing::debug!(bytes = value.data.len(), "Cache hit");
                Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    value.data,
                ))
            }
            _ => {
                tracing::debug!("Cache miss");
                Err(ApiError::key_not_found(&key, &tenant))
            }
        }
    }
    .instrument(span)
    .await
}

/// DELETE /evcrest/v1.0/{app_id}/{key} - Remove a value
///
/// Answers as soon as the delete is submitted; per-group completion is not
/// awaited.
#[utoipa::path(
    delete,
    path = "/evcrest/v1.0/{app_id}/{key}",
    tag = "Cache",
    params(
        ("app_id" = String, Path, description = "Application id, case-insensitive"),
        ("key" = String, Path, description = "Cache key"),
    ),
    responses(
        (status = 200, description = "Delete submitted", body = String),
        (status = 500, description = "Cache delete failed"),
    ),
)]
pub async fn remove(
    State(registry): State<Arc<ClientRegistry>>,
    Path((app_id, key)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let tenant = TenantId::parse(&app_id)?;

    let span = info_span!("cache_remove", tenant = %tenant, key = %key);
    async move {
        let targeted = delete_value(&registry, &tenant, &key).await?;
        tracing::debug!(targeted, "Delete submitted");

        Ok::<_, ApiError>((StatusCode::OK, deleted_message(&key)))
    }
    .instrument(span)
    .await
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the cache router, nested under `/evcrest/v1.0`.
pub fn create_router() -> Router<AppState> {
    Router::new().route(
        "/:app_id/:key",
        post(store).put(store_put).get(fetch).delete(remove),
    )
}
