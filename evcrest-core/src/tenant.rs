//! Tenant (application) identifiers.

use std::fmt;

use crate::error::InputError;

/// A case-insensitive application namespace, stored in canonical uppercase.
///
/// The only constructor normalizes, so two ids that differ only in case are
/// equal and hash identically. The registry relies on this to hand out one
/// client per application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Normalize a raw application id taken from a request path.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        if raw.is_empty() {
            return Err(InputError::EmptyTenant);
        }
        Ok(Self(raw.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
