//! evcrest API - HTTP gateway to a replicated cache cluster
//!
//! Exposes store, fetch and remove for each application (tenant) over REST.
//! Every tenant gets its own cache client, built on first use; writes are
//! fanned out to all server groups and answered once enough of them
//! acknowledge or the quorum wait runs out.

pub mod config;
pub mod error;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{resolve_bind_addr, GatewayConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
