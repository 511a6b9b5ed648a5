//! evcrest storage - the gateway's view of the cache cluster
//!
//! Defines the capabilities the gateway needs from a cache cluster client
//! ([`ClientFactory`], [`CacheClient`], [`WriteLatch`]), the per-tenant
//! [`ClientRegistry`], and the [`QuorumCoordinator`] that turns a fan-out
//! write into a [`evcrest_core::WriteOutcome`].
//!
//! The [`memory`] module provides an in-process cluster implementing those
//! capabilities so the gateway can run without an external cluster.

pub mod latch;
pub mod memory;
pub mod quorum;
pub mod registry;
pub mod traits;

pub use latch::GroupLatch;
pub use memory::{
    InMemoryCacheClient, InMemoryClientFactory, InMemoryCluster, ServerGroup, TenantScopedKey,
    MAX_KEY_BYTES,
};
pub use quorum::{QuorumCoordinator, QUORUM_WAIT, WRITE_POLICY};
pub use registry::{ClientRegistry, Resolution};
pub use traits::{CacheClient, ClientFactory, ClientHandle, WriteLatch};
