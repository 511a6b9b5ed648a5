//! evcrest core - shared types for the cache gateway
//!
//! Tenant identifiers, write requests, quorum policies and the pure
//! classification of a fan-out write into a [`WriteOutcome`]. Nothing in
//! this crate does I/O; the storage and API crates build on it.

pub mod error;
pub mod outcome;
pub mod request;
pub mod tenant;

pub use error::{
    CacheOperation, CacheOperationError, ClientConstructionError, GatewayError, GatewayResult,
    InputError,
};
pub use outcome::{classify, LatchSnapshot, LatchWait, QuorumPolicy, WriteOutcome};
pub use request::{CacheValue, Flag, Ttl, WriteRequest};
pub use tenant::TenantId;
