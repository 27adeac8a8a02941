//! The persisted cache entry document.

use crate::config::DEFAULT_TTL;
use crate::error::{Error, Result};
use bson::Bson;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One cache entry as stored in the backing collection.
///
/// Field names match the on-disk document format: the TTL index is declared
/// on `expireAt`, and `compressed` is present only for values written through
/// the compression path.
///
/// At most one live document exists per `key` within a collection; writes go
/// through upsert-on-key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Bson,
    #[serde(rename = "expireAt")]
    pub expire_at: bson::DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
}

impl CacheEntry {
    /// Build an entry expiring `ttl` from now (60s when omitted).
    ///
    /// `expire_at` is always computed fresh; a repeated `set` replaces the
    /// previous expiry rather than extending it.
    ///
    /// # Errors
    /// Returns `ConfigError` if the TTL pushes the expiry timestamp outside
    /// the representable millisecond range.
    pub fn new(key: impl Into<String>, value: Bson, ttl: Option<Duration>) -> Result<Self> {
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        let ttl_millis = i64::try_from(ttl.as_millis())
            .map_err(|_| Error::ConfigError(format!("TTL out of range: {:?}", ttl)))?;
        let expire_millis = bson::DateTime::now()
            .timestamp_millis()
            .checked_add(ttl_millis)
            .ok_or_else(|| Error::ConfigError(format!("TTL out of range: {:?}", ttl)))?;

        Ok(CacheEntry {
            key: key.into(),
            value,
            expire_at: bson::DateTime::from_millis(expire_millis),
            compressed: None,
        })
    }

    /// Client-side expiry double-check.
    ///
    /// The backing store's TTL reaper can lag wall clock; reads must not trust
    /// the mere presence of a document.
    pub fn is_expired(&self) -> bool {
        self.expire_at.timestamp_millis() <= bson::DateTime::now().timestamp_millis()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.unwrap_or(false)
    }
}
