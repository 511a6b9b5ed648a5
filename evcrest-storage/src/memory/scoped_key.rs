//! Tenant-scoped keys for the in-process cluster.
//!
//! Every tenant shares the same server groups, so keys are stored together
//! with the tenant that wrote them. The private inner struct means a key can
//! only be built from a tenant, which keeps one tenant's reads away from
//! another tenant's data.

use std::fmt;

use evcrest_core::TenantId;

/// Separator between tenant and key in the rendered form used in logs.
const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey {
    inner: ScopedKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopedKeyInner {
    tenant: TenantId,
    key: String,
}

impl TenantScopedKey {
    pub fn new(tenant: &TenantId, key: &str) -> Self {
        Self {
            inner: ScopedKeyInner {
                tenant: tenant.clone(),
                key: key.to_string(),
            },
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.inner.tenant
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn belongs_to(&self, tenant: &TenantId) -> bool {
        &self.inner.tenant == tenant
    }
}

impl fmt::Display for TenantScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.inner.tenant, SEPARATOR, self.inner.key)
    }
}
