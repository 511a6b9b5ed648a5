//! In-process reference cluster.
//!
//! A cluster is a fixed set of [`ServerGroup`]s shared by every tenant.
//! Writes and deletes fan out one task per group and report into a
//! [`GroupLatch`]; reads try each available group in order. Groups can be
//! taken offline or slowed down, which is how the gateway's quorum paths are
//! exercised without an external cluster.

mod group;
mod scoped_key;

pub use group::ServerGroup;
pub use scoped_key::TenantScopedKey;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use evcrest_core::{
    CacheOperation, CacheOperationError, CacheValue, ClientConstructionError, QuorumPolicy,
    TenantId, Ttl,
};

use crate::latch::GroupLatch;
use crate::traits::{CacheClient, ClientFactory, ClientHandle, WriteLatch};

/// Longest key the cluster accepts, in bytes.
pub const MAX_KEY_BYTES: usize = 250;

fn validate_key(operation: CacheOperation, key: &str) -> Result<(), CacheOperationError> {
    let reason = if key.is_empty() {
        "key must not be empty".to_string()
    } else if key.len() > MAX_KEY_BYTES {
        format!("key exceeds {MAX_KEY_BYTES} bytes")
    } else if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        "key contains whitespace or control characters".to_string()
    } else {
        return Ok(());
    };
    Err(CacheOperationError::new(operation, key, reason))
}

// ============================================================================
// CLUSTER
// ============================================================================

#[derive(Debug)]
pub struct InMemoryCluster {
    groups: Vec<Arc<ServerGroup>>,
}

impl InMemoryCluster {
    /// A cluster with `server_groups` groups. At least one group is created.
    pub fn new(server_groups: usize) -> Self {
        let groups = (0..server_groups.max(1))
            .map(|i| Arc::new(ServerGroup::new(format!("group-{i}"))))
            .collect();
        Self { groups }
    }

    pub fn server_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[Arc<ServerGroup>] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Arc<ServerGroup>> {
        self.groups.get(index)
    }

    /// Start a write on every group. Must be called inside a Tokio runtime.
    fn fan_out_set(
        &self,
        key: TenantScopedKey,
        value: CacheValue,
        ttl: Ttl,
        policy: QuorumPolicy,
    ) -> Arc<GroupLatch> {
        tracing::debug!(key = %key, groups = self.groups.len(), "Fanning out write");
        let latch = GroupLatch::new(self.groups.len(), policy);
        for group in &self.groups {
            let group = Arc::clone(group);
            let latch = Arc::clone(&latch);
            let key = key.clone();
            let value = value.clone();
            tokio::spawn(async move {
                let ok = group.set(key, value, ttl).await;
                if !ok {
                    tracing::debug!(group = group.name(), "Server group rejected write");
                }
                latch.record(ok);
            });
        }
        latch
    }

    /// Start a delete on every group. Must be called inside a Tokio runtime.
    fn fan_out_delete(&self, key: TenantScopedKey, policy: QuorumPolicy) -> Arc<GroupLatch> {
        tracing::debug!(key = %key, groups = self.groups.len(), "Fanning out delete");
        let latch = GroupLatch::new(self.groups.len(), policy);
        for group in &self.groups {
            let group = Arc::clone(group);
            let latch = Arc::clone(&latch);
            let key = key.clone();
            tokio::spawn(async move {
                let ok = group.delete(&key).await;
                if !ok {
                    tracing::debug!(group = group.name(), "Server group rejected delete");
                }
                latch.record(ok);
            });
        }
        latch
    }

    /// First hit across available groups. `None` if no group is available.
    fn get(&self, key: &TenantScopedKey) -> Option<Option<CacheValue>> {
        let mut any_available = false;
        for group in self.groups.iter().filter(|g| g.is_available()) {
            any_available = true;
            if let Some(value) = group.get(key) {
                return Some(Some(value));
            }
        }
        any_available.then_some(None)
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// A tenant's handle onto a shared [`InMemoryCluster`].
#[derive(Debug)]
pub struct InMemoryCacheClient {
    tenant: TenantId,
    cluster: Arc<InMemoryCluster>,
}

impl InMemoryCacheClient {
    pub fn new(tenant: TenantId, cluster: Arc<InMemoryCluster>) -> Self {
        Self { tenant, cluster }
    }

    fn scoped(&self, key: &str) -> TenantScopedKey {
        TenantScopedKey::new(&self.tenant, key)
    }
}

#[async_trait]
impl CacheClient for InMemoryCacheClient {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn server_groups(&self) -> usize {
        self.cluster.server_groups()
    }

    async fn write(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Ttl,
        policy: QuorumPolicy,
    ) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
        validate_key(CacheOperation::Write, key)?;
        let latch: Arc<dyn WriteLatch> =
            self.cluster.fan_out_set(self.scoped(key), value, ttl, policy);
        Ok(Some(latch))
    }

    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheOperationError> {
        validate_key(CacheOperation::Read, key)?;
        self.cluster.get(&self.scoped(key)).ok_or_else(|| {
            CacheOperationError::new(CacheOperation::Read, key, "no server group available")
        })
    }

    async fn delete(&self, key: &str) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
        validate_key(CacheOperation::Delete, key)?;
        let latch: Arc<dyn WriteLatch> =
            self.cluster.fan_out_delete(self.scoped(key), QuorumPolicy::All);
        Ok(Some(latch))
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Builds [`InMemoryCacheClient`]s that all share one cluster.
#[derive(Debug)]
pub struct InMemoryClientFactory {
    cluster: Arc<InMemoryCluster>,
    builds: AtomicUsize,
}

impl InMemoryClientFactory {
    pub fn new(cluster: Arc<InMemoryCluster>) -> Self {
        Self {
            cluster,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn cluster(&self) -> &Arc<InMemoryCluster> {
        &self.cluster
    }

    /// How many clients this factory has built.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for InMemoryClientFactory {
    async fn build(&self, tenant: &TenantId) -> Result<ClientHandle, ClientConstructionError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            tenant = %tenant,
            server_groups = self.cluster.server_groups(),
            "Attaching tenant to in-memory cluster"
        );
        Ok(Arc::new(InMemoryCacheClient::new(
            tenant.clone(),
            Arc::clone(&self.cluster),
        )))
    }
}
