//! Write requests and the values stored in the cache.

use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;

use crate::error::InputError;
use crate::tenant::TenantId;

/// Time-to-live in whole seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ttl(NonZeroU32);

impl Ttl {
    pub fn from_secs(secs: u32) -> Option<Self> {
        NonZeroU32::new(secs).map(Self)
    }

    /// Parse the `ttl` query parameter for `key`.
    pub fn parse(key: &str, raw: Option<&str>) -> Result<Self, InputError> {
        let raw = raw.ok_or_else(|| InputError::MissingTtl {
            key: key.to_string(),
        })?;
        raw.parse::<u32>()
            .ok()
            .and_then(Self::from_secs)
            .ok_or_else(|| InputError::InvalidTtl {
                key: key.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn as_secs(&self) -> u32 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0.get()))
    }
}

/// Numeric format annotation carried alongside a payload.
///
/// Any signed 32-bit value is accepted, negative ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flag(pub i32);

impl Flag {
    /// Parse the optional `flag` query parameter. An empty value means no flag.
    pub fn parse(key: &str, raw: Option<&str>) -> Result<Option<Self>, InputError> {
        match raw {
            None => Ok(None),
            Some(v) if v.is_empty() => Ok(None),
            Some(v) => v
                .parse::<i32>()
                .map(|f| Some(Self(f)))
                .map_err(|_| InputError::InvalidFlag {
                    key: key.to_string(),
                    value: v.to_string(),
                }),
        }
    }
}

/// A payload as the cache stores it.
///
/// Payload bytes are never transformed; the flag, when present, travels
/// next to them rather than inside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue {
    pub data: Bytes,
    pub flag: Option<Flag>,
}

impl CacheValue {
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            flag: None,
        }
    }

    pub fn annotated(data: impl Into<Bytes>, flag: Flag) -> Self {
        Self {
            data: data.into(),
            flag: Some(flag),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A validated store request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub tenant: TenantId,
    pub key: String,
    pub payload: Bytes,
    pub ttl: Ttl,
    pub flag: Option<Flag>,
}

impl WriteRequest {
    /// Validate raw request parts. Nothing here touches the cache.
    pub fn parse(
        app_id: &str,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        ttl: Option<&str>,
        flag: Option<&str>,
    ) -> Result<Self, InputError> {
        let key = key.into();
        let tenant = TenantId::parse(app_id)?;
        let ttl = Ttl::parse(&key, ttl)?;
        let flag = Flag::parse(&key, flag)?;
        Ok(Self {
            tenant,
            key,
            payload: payload.into(),
            ttl,
            flag,
        })
    }

    /// The value to hand to the cache client.
    pub fn value(&self) -> CacheValue {
        match self.flag {
            Some(flag) => CacheValue::annotated(self.payload.clone(), flag),
            None => CacheValue::raw(self.payload.clone()),
        }
    }
}
