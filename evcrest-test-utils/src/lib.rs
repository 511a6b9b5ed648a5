//! evcrest Test Utilities
//!
//! Shared test infrastructure for the evcrest workspace:
//! - A scriptable mock cache client and factory
//! - Proptest generators for request parts
//! - Fixtures wiring up registries over the in-memory cluster
//! - Assertions on write outcomes

pub use evcrest_core::{
    CacheOperation, CacheOperationError, CacheValue, ClientConstructionError, Flag, LatchSnapshot,
    LatchWait, QuorumPolicy, TenantId, Ttl, WriteOutcome,
};
pub use evcrest_storage::{
    CacheClient, ClientFactory, ClientHandle, ClientRegistry, InMemoryClientFactory,
    InMemoryCluster, QuorumCoordinator, WriteLatch,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK CLIENT
// ============================================================================

/// Latch with a fixed wait result and fixed counts.
#[derive(Debug)]
pub struct ScriptedLatch {
    wait: LatchWait,
    snapshot: LatchSnapshot,
    waited_for: Mutex<Option<Duration>>,
}

impl ScriptedLatch {
    pub fn new(wait: LatchWait, snapshot: LatchSnapshot) -> Self {
        Self {
            wait,
            snapshot,
            waited_for: Mutex::new(None),
        }
    }

    /// The timeout the latch was last awaited with.
    pub fn waited_for(&self) -> Option<Duration> {
        *lock(&self.waited_for)
    }
}

#[async_trait]
impl WriteLatch for ScriptedLatch {
    fn targeted(&self) -> usize {
        self.snapshot.targeted
    }

    fn completed(&self) -> usize {
        self.snapshot.completed
    }

    fn succeeded(&self) -> usize {
        self.snapshot.succeeded
    }

    async fn await_completion(&self, timeout: Duration) -> LatchWait {
        *lock(&self.waited_for) = Some(timeout);
        self.wait
    }
}

/// What a [`MockCacheClient`] does with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteScript {
    /// Every group acknowledges.
    AllAcknowledge,
    /// The wait times out with `succeeded` of the groups acknowledged.
    TimeoutAfter { completed: usize, succeeded: usize },
    /// The client accepts the write but hands back no latch.
    NoLatch,
    /// The client rejects the write.
    Reject(String),
}

/// Calls observed by a [`MockCacheClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Write {
        key: String,
        value: CacheValue,
        ttl: Ttl,
        policy: QuorumPolicy,
    },
    Read {
        key: String,
    },
    Delete {
        key: String,
    },
}

/// Cache client whose write results are scripted.
///
/// Values written with at least one acknowledgement land in a local map, so
/// store-then-fetch works. Reads can be made to fail with
/// [`MockCacheClient::fail_reads`].
#[derive(Debug)]
pub struct MockCacheClient {
    tenant: TenantId,
    server_groups: usize,
    write_script: Mutex<WriteScript>,
    read_failure: Mutex<Option<String>>,
    entries: DashMap<String, CacheValue>,
    calls: Mutex<Vec<MockCall>>,
    last_latch: Mutex<Option<Arc<ScriptedLatch>>>,
}

impl MockCacheClient {
    pub fn new(tenant: TenantId, server_groups: usize, write_script: WriteScript) -> Self {
        Self {
            tenant,
            server_groups,
            write_script: Mutex::new(write_script),
            read_failure: Mutex::new(None),
            entries: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            last_latch: Mutex::new(None),
        }
    }

    pub fn set_write_script(&self, script: WriteScript) {
        *lock(&self.write_script) = script;
    }

    pub fn fail_reads(&self, reason: impl Into<String>) {
        *lock(&self.read_failure) = Some(reason.into());
    }

    /// Put a value in place without going through a write.
    pub fn seed(&self, key: impl Into<String>, value: CacheValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn stored(&self, key: &str) -> Option<CacheValue> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, MockCall::Write { .. }))
            .count()
    }

    /// The latch handed out by the most recent write, if any.
    pub fn last_latch(&self) -> Option<Arc<ScriptedLatch>> {
        lock(&self.last_latch).clone()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl CacheClient for MockCacheClient {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn server_groups(&self) -> usize {
        self.server_groups
    }

    async fn write(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Ttl,
        policy: QuorumPolicy,
    ) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
        self.record(MockCall::Write {
            key: key.to_string(),
            value: value.clone(),
            ttl,
            policy,
        });

        let script = lock(&self.write_script).clone();
        let (wait, completed, succeeded) = match script {
            WriteScript::AllAcknowledge => {
                (LatchWait::Satisfied, self.server_groups, self.server_groups)
            }
            WriteScript::TimeoutAfter {
                completed,
                succeeded,
            } => (LatchWait::TimedOut, completed, succeeded),
            WriteScript::NoLatch => return Ok(None),
            WriteScript::Reject(reason) => {
                return Err(CacheOperationError::new(CacheOperation::Write, key, reason))
            }
        };

        if succeeded > 0 {
            self.entries.insert(key.to_string(), value);
        }
        let latch = Arc::new(ScriptedLatch::new(
            wait,
            LatchSnapshot::new(self.server_groups, completed, succeeded),
        ));
        *lock(&self.last_latch) = Some(Arc::clone(&latch));
        let latch: Arc<dyn WriteLatch> = latch;
        Ok(Some(latch))
    }

    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheOperationError> {
        self.record(MockCall::Read {
            key: key.to_string(),
        });
        if let Some(reason) = lock(&self.read_failure).clone() {
            return Err(CacheOperationError::new(CacheOperation::Read, key, reason));
        }
        Ok(self.stored(key))
    }

    async fn delete(&self, key: &str) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
        self.record(MockCall::Delete {
            key: key.to_string(),
        });
        self.entries.remove(key);
        Ok(None)
    }
}

/// Factory handing out one [`MockCacheClient`] per tenant.
///
/// Counts every build, can be told to fail a number of builds first, and
/// keeps the clients it made so tests can inspect them afterwards.
#[derive(Debug)]
pub struct MockClientFactory {
    server_groups: usize,
    write_script: WriteScript,
    build_delay: Duration,
    builds: AtomicUsize,
    failures_remaining: AtomicUsize,
    clients: DashMap<TenantId, Arc<MockCacheClient>>,
}

impl MockClientFactory {
    pub fn new(server_groups: usize, write_script: WriteScript) -> Self {
        Self {
            server_groups,
            write_script,
            build_delay: Duration::ZERO,
            builds: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            clients: DashMap::new(),
        }
    }

    /// Sleep inside each build.
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    /// Fail the next `n` builds.
    pub fn with_failures(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// The client built or prepared for `tenant`.
    pub fn client(&self, tenant: &TenantId) -> Option<Arc<MockCacheClient>> {
        self.clients.get(tenant).map(|c| Arc::clone(c.value()))
    }

    /// Create the tenant's client ahead of time without counting a build.
    /// The next build for the tenant returns this client.
    pub fn prepare(&self, tenant: &TenantId) -> Arc<MockCacheClient> {
        Arc::clone(
            self.clients
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(self.new_client(tenant)))
                .value(),
        )
    }

    fn new_client(&self, tenant: &TenantId) -> MockCacheClient {
        MockCacheClient::new(tenant.clone(), self.server_groups, self.write_script.clone())
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn build(&self, tenant: &TenantId) -> Result<ClientHandle, ClientConstructionError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ClientConstructionError::new(
                tenant.as_str(),
                "scripted construction failure",
            ));
        }
        let client: ClientHandle = self.prepare(tenant);
        Ok(client)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for request parts.

    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    /// An application id as a caller might type it, in mixed case.
    pub fn arb_app_id() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,15}"
    }

    /// A key the in-memory cluster accepts.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_.-]{1,64}"
    }

    pub fn arb_payload() -> impl Strategy<Value = Bytes> {
        prop::collection::vec(any::<u8>(), 1..512).prop_map(Bytes::from)
    }

    pub fn arb_ttl() -> impl Strategy<Value = Ttl> {
        (1u32..=86_400).prop_filter_map("ttl must be positive", Ttl::from_secs)
    }

    pub fn arb_flag() -> impl Strategy<Value = Option<Flag>> {
        proptest::option::of(any::<i32>().prop_map(Flag))
    }

    /// Server group count and a number of acknowledgements within it.
    pub fn arb_groups_and_acks() -> impl Strategy<Value = (usize, usize)> {
        (1usize..=8).prop_flat_map(|groups| (Just(groups), 0..=groups))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    #[track_caller]
    pub fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap_or_else(|e| panic!("invalid fixture tenant {raw:?}: {e}"))
    }

    #[track_caller]
    pub fn ttl(secs: u32) -> Ttl {
        Ttl::from_secs(secs).unwrap_or_else(|| panic!("fixture ttl must be positive"))
    }

    /// A registry over a fresh in-memory cluster with `groups` server groups.
    pub fn in_memory_registry(
        groups: usize,
    ) -> (Arc<InMemoryCluster>, Arc<InMemoryClientFactory>, Arc<ClientRegistry>) {
        let cluster = Arc::new(InMemoryCluster::new(groups));
        let factory = Arc::new(InMemoryClientFactory::new(Arc::clone(&cluster)));
        let registry = Arc::new(ClientRegistry::new(factory.clone()));
        (cluster, factory, registry)
    }

    /// A registry over a [`MockClientFactory`].
    pub fn mock_registry(
        groups: usize,
        script: WriteScript,
    ) -> (Arc<MockClientFactory>, Arc<ClientRegistry>) {
        let factory = Arc::new(MockClientFactory::new(groups, script));
        let registry = Arc::new(ClientRegistry::new(factory.clone()));
        (factory, registry)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on write outcomes.

    use super::*;

    #[track_caller]
    pub fn assert_complete(outcome: &Result<WriteOutcome, CacheOperationError>) {
        match outcome {
            Ok(WriteOutcome::Complete) => {}
            other => panic!("Expected Complete, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_partial(outcome: &Result<WriteOutcome, CacheOperationError>, groups: usize) {
        match outcome {
            Ok(WriteOutcome::PartialSuccess(n)) => {
                assert_eq!(*n, groups, "Wrong acknowledged group count in PartialSuccess")
            }
            other => panic!("Expected PartialSuccess({}), got: {:?}", groups, other),
        }
    }

    #[track_caller]
    pub fn assert_failure(outcome: &Result<WriteOutcome, CacheOperationError>) {
        match outcome {
            Ok(WriteOutcome::Failure) => {}
            other => panic!("Expected Failure, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
