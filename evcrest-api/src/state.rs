//! Shared application state for Axum routers.

use std::sync::Arc;

use evcrest_storage::{ClientRegistry, QuorumCoordinator};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// One cache client per tenant, built on first use.
    pub registry: Arc<ClientRegistry>,
    /// Fan-out writes with the fixed quorum policy and wait.
    pub coordinator: QuorumCoordinator,
    /// Server groups behind every client, reported by readiness.
    pub server_groups: usize,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(registry: Arc<ClientRegistry>, server_groups: usize) -> Self {
        Self {
            registry,
            coordinator: QuorumCoordinator::new(),
            server_groups,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<ClientRegistry>, registry);
crate::impl_from_ref!(QuorumCoordinator, coordinator);
