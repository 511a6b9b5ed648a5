//! A single in-process server group.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use evcrest_core::{CacheValue, TenantId, Ttl};
use tokio::time::Instant;

use super::scoped_key::TenantScopedKey;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: CacheValue,
    expires_at: Instant,
}

/// One replica of the cache: a key/value map with expiry plus fault
/// injection knobs.
///
/// An unavailable group fails every write and delete and is skipped by
/// reads. A delay is applied before each write or delete is acknowledged.
#[derive(Debug)]
pub struct ServerGroup {
    name: String,
    entries: DashMap<TenantScopedKey, StoredEntry>,
    available: AtomicBool,
    delay_ms: AtomicU64,
}

impl ServerGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            available: AtomicBool::new(true),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn set_available(&self, available: bool) {
        tracing::info!(group = %self.name, available, "Server group availability changed");
        self.available.store(available, Ordering::Release);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Acquire))
    }

    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::Release);
    }

    async fn acknowledge_after_delay(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Store a value. Returns whether the group accepted it.
    pub async fn set(&self, key: TenantScopedKey, value: CacheValue, ttl: Ttl) -> bool {
        self.acknowledge_after_delay().await;
        if !self.is_available() {
            return false;
        }
        let expires_at = Instant::now() + ttl.as_duration();
        self.entries.insert(key, StoredEntry { value, expires_at });
        true
    }

    /// Remove a value. Returns whether the group accepted the delete.
    pub async fn delete(&self, key: &TenantScopedKey) -> bool {
        self.acknowledge_after_delay().await;
        if !self.is_available() {
            return false;
        }
        self.entries.remove(key);
        true
    }

    /// Look up an unexpired value, dropping it if it has expired.
    pub fn get(&self, key: &TenantScopedKey) -> Option<CacheValue> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
            None => None,
        }
    }

    /// Unexpired entries held for `tenant`.
    pub fn len_for(&self, tenant: &TenantId) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.key().belongs_to(tenant) && entry.value().expires_at > now)
            .count()
    }

    /// Entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tenant: &str, key: &str) -> TenantScopedKey {
        TenantScopedKey::new(&TenantId::parse(tenant).unwrap(), key)
    }

    fn ttl(secs: u32) -> Ttl {
        Ttl::from_secs(secs).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_get_and_expire() {
        let group = ServerGroup::new("g0");
        assert!(group.set(key("app", "k"), CacheValue::raw(&b"v"[..]), ttl(1)).await);
        assert_eq!(group.get(&key("app", "k")), Some(CacheValue::raw(&b"v"[..])));

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(group.get(&key("app", "k")), None);
        assert!(group.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_group_rejects_writes() {
        let group = ServerGroup::new("g0");
        group.set_available(false);
        assert!(!group.set(key("app", "k"), CacheValue::raw(&b"v"[..]), ttl(60)).await);
        assert!(!group.delete(&key("app", "k")).await);
        assert_eq!(group.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_postpones_acknowledgement() {
        let group = ServerGroup::new("g0");
        group.set_delay(Duration::from_secs(3));
        assert_eq!(group.delay(), Duration::from_secs(3));

        let started = Instant::now();
        assert!(group.set(key("app", "k"), CacheValue::raw(&b"v"[..]), ttl(60)).await);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_len_for_counts_only_tenant_entries() {
        let group = ServerGroup::new("g0");
        group.set(key("a", "1"), CacheValue::raw(&b"x"[..]), ttl(60)).await;
        group.set(key("a", "2"), CacheValue::raw(&b"x"[..]), ttl(60)).await;
        group.set(key("b", "1"), CacheValue::raw(&b"x"[..]), ttl(60)).await;

        assert_eq!(group.len_for(&TenantId::parse("A").unwrap()), 2);
        assert_eq!(group.len_for(&TenantId::parse("b").unwrap()), 1);
        assert_eq!(group.len(), 3);
    }
}
