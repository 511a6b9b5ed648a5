//! Cache cluster capabilities consumed by the gateway.
//!
//! These traits are the whole contract between the gateway and a cache
//! cluster client. Connection pooling, membership, hashing and the wire
//! protocol all live behind them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evcrest_core::{
    CacheOperationError, CacheValue, ClientConstructionError, LatchSnapshot, LatchWait,
    QuorumPolicy, TenantId, Ttl,
};

/// Shared handle to one tenant's cache client.
pub type ClientHandle = Arc<dyn CacheClient>;

/// Builds cache clients, one per tenant.
///
/// Construction may be expensive and stateful; the registry calls `build`
/// at most once per tenant.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, tenant: &TenantId) -> Result<ClientHandle, ClientConstructionError>;
}

/// A tenant-bound cache client.
///
/// Implementations must be safe for unsynchronized concurrent use: many
/// request handlers share one handle.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// The tenant this client is bound to.
    fn tenant(&self) -> &TenantId;

    /// Number of server groups a write fans out to.
    fn server_groups(&self) -> usize;

    /// Submit a write to every server group.
    ///
    /// Returns the latch tracking per-group completion, or `None` when the
    /// client has nothing observable to report for this write.
    async fn write(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Ttl,
        policy: QuorumPolicy,
    ) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError>;

    /// Read a value. `Ok(None)` is a miss.
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheOperationError>;

    /// Submit a delete to every server group.
    async fn delete(&self, key: &str) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError>;
}

/// Observable completion of an operation fanned out to server groups.
#[async_trait]
pub trait WriteLatch: Send + Sync {
    /// Server groups the operation was sent to.
    fn targeted(&self) -> usize;

    /// Server groups that have finished, successfully or not.
    fn completed(&self) -> usize;

    /// Server groups that finished successfully.
    fn succeeded(&self) -> usize;

    /// Wait up to `timeout` for the required acknowledgements.
    async fn await_completion(&self, timeout: Duration) -> LatchWait;

    /// All three counts at once.
    fn snapshot(&self) -> LatchSnapshot {
        LatchSnapshot::new(self.targeted(), self.completed(), self.succeeded())
    }
}
