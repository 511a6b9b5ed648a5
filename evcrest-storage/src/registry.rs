//! Per-tenant cache client registry.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use evcrest_core::{ClientConstructionError, TenantId};
use tokio::sync::OnceCell;

use crate::traits::{ClientFactory, ClientHandle};

/// Lazily builds and caches one cache client per tenant.
///
/// Each tenant owns a once-cell in a concurrent map. The first caller for a
/// tenant runs the factory; callers racing with it wait on the same cell
/// and receive the same handle. A failed build leaves the cell empty, so
/// nothing is published and the next resolve tries again.
///
/// Entries are never evicted; tenants are expected to be few and
/// long-lived.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    clients: DashMap<TenantId, Arc<OnceCell<ClientHandle>>>,
    built: AtomicUsize,
}

/// A resolved client and whether this call built it.
pub struct Resolution {
    pub handle: ClientHandle,
    pub built: bool,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: DashMap::new(),
            built: AtomicUsize::new(0),
        }
    }

    /// Get the tenant's client, building it on first use.
    pub async fn resolve(&self, tenant: &TenantId) -> Result<ClientHandle, ClientConstructionError> {
        self.resolve_with_status(tenant).await.map(|r| r.handle)
    }

    /// Like [`ClientRegistry::resolve`], also reporting whether this call
    /// ran the factory.
    pub async fn resolve_with_status(
        &self,
        tenant: &TenantId,
    ) -> Result<Resolution, ClientConstructionError> {
        if let Some(handle) = self.get(tenant) {
            return Ok(Resolution { handle, built: false });
        }

        let built = AtomicBool::new(false);

        // Clone the cell out so no shard lock is held across the build.
        let cell = self.clients.entry(tenant.clone()).or_default().value().clone();

        let handle = cell
            .get_or_try_init(|| async {
                tracing::info!(tenant = %tenant, "Building cache client");
                let handle = self.factory.build(tenant).await.inspect_err(|e| {
                    tracing::error!(tenant = %tenant, error = %e, "Cache client construction failed");
                })?;
                tracing::info!(
                    tenant = %tenant,
                    server_groups = handle.server_groups(),
                    "Cache client ready"
                );
                built.store(true, Ordering::Relaxed);
                self.built.fetch_add(1, Ordering::Relaxed);
                Ok::<_, ClientConstructionError>(handle)
            })
            .await?;

        Ok(Resolution {
            handle: Arc::clone(handle),
            built: built.into_inner(),
        })
    }

    /// The tenant's client if it has already been built.
    pub fn get(&self, tenant: &TenantId) -> Option<ClientHandle> {
        self.clients
            .get(tenant)
            .and_then(|cell| cell.value().get().map(Arc::clone))
    }

    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.get(tenant).is_some()
    }

    /// Number of tenants with a built client.
    pub fn len(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tenants with a built client, sorted.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self
            .clients
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        tenants.sort();
        tenants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use evcrest_core::{CacheOperationError, CacheValue, QuorumPolicy, Ttl};

    use crate::traits::{CacheClient, WriteLatch};

    struct NullClient {
        tenant: TenantId,
    }

    #[async_trait]
    impl CacheClient for NullClient {
        fn tenant(&self) -> &TenantId {
            &self.tenant
        }

        fn server_groups(&self) -> usize {
            1
        }

        async fn write(
            &self,
            _key: &str,
            _value: CacheValue,
            _ttl: Ttl,
            _policy: QuorumPolicy,
        ) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
            Ok(None)
        }

        async fn read(&self, _key: &str) -> Result<Option<CacheValue>, CacheOperationError> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
            Ok(None)
        }
    }

    /// Counts builds and sleeps inside each one to widen the race window.
    #[derive(Default)]
    struct SlowFactory {
        builds: AtomicUsize,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl ClientFactory for SlowFactory {
        async fn build(&self, tenant: &TenantId) -> Result<ClientHandle, ClientConstructionError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ClientConstructionError::new(tenant.as_str(), "cluster unreachable"));
            }
            Ok(Arc::new(NullClient {
                tenant: tenant.clone(),
            }))
        }
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_case_variants_share_one_handle() -> Result<(), ClientConstructionError> {
        let factory = Arc::new(SlowFactory::default());
        let registry = ClientRegistry::new(factory.clone());

        let a = registry.resolve(&tenant("movies")).await?;
        let b = registry.resolve(&tenant("MOVIES")).await?;
        let c = registry.resolve(&tenant("MoViEs")).await?;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(a.tenant().as_str(), "MOVIES");
        Ok(())
    }

    #[tokio::test]
    async fn test_only_the_building_resolve_reports_a_build() -> Result<(), ClientConstructionError> {
        let factory = Arc::new(SlowFactory::default());
        factory.fail_first.store(1, Ordering::SeqCst);
        let registry = ClientRegistry::new(factory.clone());

        assert!(registry.resolve_with_status(&tenant("tv")).await.is_err());
        assert_eq!(registry.len(), 0);

        let first = registry.resolve_with_status(&tenant("tv")).await?;
        let again = registry.resolve_with_status(&tenant("TV")).await?;
        let other = registry.resolve_with_status(&tenant("music")).await?;

        assert!(first.built);
        assert!(!again.built);
        assert!(other.built);
        assert!(Arc::ptr_eq(&first.handle, &again.handle));
        assert_eq!(registry.len(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_builds_once() {
        let factory = Arc::new(SlowFactory::default());
        let registry = Arc::new(ClientRegistry::new(factory.clone()));

        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = Arc::clone(&registry);
            let raw = if i % 2 == 0 { "ratings" } else { "RATINGS" };
            tasks.push(tokio::spawn(async move { registry.resolve(&tenant(raw)).await }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        let first = &handles[0];
        assert!(handles.iter().all(|h| Arc::ptr_eq(first, h)));
    }

    #[tokio::test]
    async fn test_failed_build_publishes_nothing_and_retries() {
        let factory = Arc::new(SlowFactory::default());
        factory.fail_first.store(1, Ordering::SeqCst);
        let registry = ClientRegistry::new(factory.clone());
        let t = tenant("search");

        let err = registry.resolve(&t).await;
        assert!(err.is_err());
        assert!(!registry.contains(&t));
        assert!(registry.is_empty());

        let handle = registry.resolve(&t).await;
        assert!(handle.is_ok());
        assert!(registry.contains(&t));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() -> Result<(), ClientConstructionError> {
        let factory = Arc::new(SlowFactory::default());
        let registry = ClientRegistry::new(factory.clone());

        let a = registry.resolve(&tenant("alpha")).await?;
        let b = registry.resolve(&tenant("beta")).await?;

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.tenants(), vec![tenant("ALPHA"), tenant("BETA")]);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
