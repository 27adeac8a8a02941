//! The public cache store.
//!
//! All operations are lazy: the first one to run drives the session gate
//! through connect and TTL-index creation, and every operation afterwards
//! reuses the bound collection. Share a store across tasks by wrapping it in
//! `Arc`; all methods take `&self`.

use crate::codec;
use crate::config::StoreOptions;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::session::{Connect, SessionGate};
use bson::Bson;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "mongo")]
use crate::backend::mongo::{MongoConnector, MongoTarget};
use crate::backend::DocumentBackend;

/// Key-value cache over a document collection, with per-entry TTL and
/// optional transparent gzip compression of binary values.
///
/// # Miss semantics
///
/// `get` reports a miss as `Ok(Bson::Null)`, never as an error. A stored
/// `Null` value therefore reads back exactly like a miss; this matches the
/// original facade contract and is deliberate.
///
/// # Example
///
/// ```no_run
/// use cacheman_mongo::{MongoStore, StoreOptions};
/// use bson::Bson;
///
/// # async fn example() -> cacheman_mongo::Result<()> {
/// let store = MongoStore::new("mongodb://127.0.0.1:27017", StoreOptions::new());
///
/// store.set("greeting", Bson::String("hello".into()), None).await?;
/// let value = store.get("greeting").await?;
/// assert_eq!(value, Bson::String("hello".into()));
/// # Ok(())
/// # }
/// ```
pub struct CacheStore<C: Connect> {
    gate: SessionGate<C>,
    compression: bool,
    default_ttl: Duration,
    closed: AtomicBool,
}

/// Cache store bound to MongoDB.
#[cfg(feature = "mongo")]
pub type MongoStore = CacheStore<MongoConnector>;

#[cfg(feature = "mongo")]
impl MongoStore {
    /// Create a store from a connection descriptor and options.
    ///
    /// `target` accepts a URI string, a pre-bound collection, database, or
    /// client handle, or plain connection parameters (see [`MongoTarget`]).
    /// No I/O happens here; the connection is established by the first
    /// operation.
    pub fn new(target: impl Into<MongoTarget>, options: StoreOptions) -> Self {
        let (cache, connection) = options.split();
        let compression = cache.compression;
        let default_ttl = cache.default_ttl;
        CacheStore {
            gate: SessionGate::new(MongoConnector::new(target.into(), cache, connection)),
            compression,
            default_ttl,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a store connecting from the options bag alone.
    ///
    /// The URI is built from the host/port/credentials in `options`;
    /// equivalent to `new(MongoTarget::Options, options)`.
    pub fn from_options(options: StoreOptions) -> Self {
        Self::new(MongoTarget::Options, options)
    }
}

impl<C: Connect> CacheStore<C> {
    /// Create a store over an arbitrary connector.
    ///
    /// Connection fields in `options` are ignored; the connector already
    /// knows how to reach its backend.
    pub fn with_connector(connector: C, options: StoreOptions) -> Self {
        let (cache, _connection) = options.split();
        CacheStore {
            gate: SessionGate::new(connector),
            compression: cache.compression,
            default_ttl: cache.default_ttl,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Get the value cached under `key`.
    ///
    /// Returns `Bson::Null` on a miss - key absent or past its TTL. Expired
    /// documents found by the read are deleted in the background; the backing
    /// store's TTL reaper can lag, so presence alone is not trusted.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure, on `DecompressionError` for a
    /// corrupted compressed entry, or `StoreClosed` after `close()`.
    pub async fn get(&self, key: &str) -> Result<Bson> {
        self.ensure_open()?;
        let backend = self.gate.ready().await?;

        let Some(entry) = backend.find_one(key).await? else {
            return Ok(Bson::Null);
        };

        if entry.is_expired() {
            // Stale document: report the miss now, clean up off the hot path.
            // Cleanup failure is logged and dropped; the next read or the
            // server-side reaper will retry.
            let cleanup = backend.clone();
            let stale_key = key.to_string();
            tokio::spawn(async move {
                if let Err(e) = cleanup.delete_one(&stale_key).await {
                    warn!("expired-entry cleanup failed for {}: {}", stale_key, e);
                }
            });
            return Ok(Bson::Null);
        }

        if entry.is_compressed() {
            let raw = codec::decompress(&entry.value)?;
            Ok(Bson::Binary(bson::Binary {
                subtype: bson::spec::BinarySubtype::Generic,
                bytes: raw,
            }))
        } else {
            Ok(entry.value)
        }
    }

    /// Cache `value` under `key` for `ttl` (the store default, 60s unless
    /// configured otherwise, when `None`).
    ///
    /// The expiry is recomputed from now on every call. When compression is
    /// enabled, binary values are gzip-encoded before the write; the caller
    /// still gets the original value back.
    ///
    /// # Errors
    /// Returns `Err` on `CompressionError` (the write is aborted), backend
    /// I/O failure, or `StoreClosed`.
    pub async fn set(&self, key: &str, value: Bson, ttl: Option<Duration>) -> Result<Bson> {
        self.ensure_open()?;
        let backend = self.gate.ready().await?;

        let entry = CacheEntry::new(key, value.clone(), ttl.or(Some(self.default_ttl)))?;
        let entry = if self.compression {
            codec::compress(entry)?
        } else {
            entry
        };

        backend.upsert(entry).await?;
        Ok(value)
    }

    /// Remove the entry for `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure or `StoreClosed`.
    pub async fn del(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        let backend = self.gate.ready().await?;
        backend.delete_one(key).await
    }

    /// Remove every entry in the bound collection.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure or `StoreClosed`.
    pub async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let backend = self.gate.ready().await?;
        backend.delete_many().await
    }

    /// Close the store.
    ///
    /// Shuts down the underlying connection only if this store opened it;
    /// caller-supplied handles stay open. Idempotent. Every operation after
    /// the first `close()` fails with [`Error::StoreClosed`] - a closed store
    /// does not re-initialize.
    ///
    /// An initialization that is still in flight is awaited and its backend
    /// torn down, so the owned connection cannot outlive the store; one that
    /// has not begun is refused at the gate and never connects.
    ///
    /// # Errors
    /// Returns `Err` if connection teardown fails.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.gate.mark_closed();
        if self.gate.started() {
            if let Ok(backend) = self.gate.ready().await {
                backend.close().await?;
            }
        }
        Ok(())
    }

    /// Serialize `value` to BSON and cache it.
    ///
    /// # Errors
    /// `SerializationError` if the value does not map to BSON, otherwise as
    /// [`CacheStore::set`].
    pub async fn set_value<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let value = bson::to_bson(value)?;
        self.set(key, value, ttl).await.map(|_| ())
    }

    /// Get and deserialize the value cached under `key`.
    ///
    /// A miss (or a stored `Null`) is `Ok(None)`.
    ///
    /// # Errors
    /// `DeserializationError` if the stored value does not map to `T`,
    /// otherwise as [`CacheStore::get`].
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Bson::Null => Ok(None),
            value => Ok(Some(bson::from_bson(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, MemoryConnector};
    use std::sync::Arc;

    fn memory_store(options: StoreOptions) -> CacheStore<MemoryConnector> {
        CacheStore::with_connector(MemoryConnector::new(MemoryBackend::new()), options)
    }

    #[tokio::test]
    async fn test_set_returns_original_value() {
        let store = memory_store(StoreOptions::new());
        let returned = store
            .set("k", Bson::Int32(7), None)
            .await
            .expect("Failed to set");
        assert_eq!(returned, Bson::Int32(7));
    }

    #[tokio::test]
    async fn test_set_returns_uncompressed_value() {
        let store = memory_store(StoreOptions::new().compression(true));
        let payload = Bson::Binary(bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec(),
        });

        let returned = store
            .set("k", payload.clone(), None)
            .await
            .expect("Failed to set");
        // Caller never observes the compressed representation
        assert_eq!(returned, payload);
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let store = memory_store(StoreOptions::new());
        store.set("k", Bson::Int32(1), None).await.expect("set");
        store.close().await.expect("Failed to close");

        assert!(matches!(store.get("k").await, Err(Error::StoreClosed)));
        assert!(matches!(
            store.set("k", Bson::Int32(2), None).await,
            Err(Error::StoreClosed)
        ));
        assert!(matches!(store.del("k").await, Err(Error::StoreClosed)));
        assert!(matches!(store.clear().await, Err(Error::StoreClosed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_works_untouched() {
        let store = memory_store(StoreOptions::new());
        // Never initialized: close must not force a connect
        store.close().await.expect("Failed to close");
        store.close().await.expect("second close should be a no-op");
    }

    #[tokio::test]
    async fn test_close_untouched_store_never_connects() {
        let connector = MemoryConnector::new(MemoryBackend::new());
        let connects = connector.connect_count_handle();
        let store = CacheStore::with_connector(connector, StoreOptions::new());

        store.close().await.expect("Failed to close");

        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(matches!(store.get("k").await, Err(Error::StoreClosed)));
    }

    #[derive(Clone)]
    struct TrackedBackend {
        inner: MemoryBackend,
        closed: Arc<AtomicBool>,
    }

    impl DocumentBackend for TrackedBackend {
        async fn create_ttl_index(&self) -> Result<()> {
            self.inner.create_ttl_index().await
        }

        async fn find_one(&self, key: &str) -> Result<Option<CacheEntry>> {
            self.inner.find_one(key).await
        }

        async fn upsert(&self, entry: CacheEntry) -> Result<()> {
            self.inner.upsert(entry).await
        }

        async fn delete_one(&self, key: &str) -> Result<()> {
            self.inner.delete_one(key).await
        }

        async fn delete_many(&self) -> Result<()> {
            self.inner.delete_many().await
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowConnector {
        backend: TrackedBackend,
        delay: Duration,
    }

    impl Connect for SlowConnector {
        type Backend = TrackedBackend;

        async fn connect(&self) -> Result<TrackedBackend> {
            tokio::time::sleep(self.delay).await;
            Ok(self.backend.clone())
        }
    }

    #[tokio::test]
    async fn test_close_during_in_flight_init_tears_down_backend() {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = SlowConnector {
            backend: TrackedBackend {
                inner: MemoryBackend::new(),
                closed: Arc::clone(&closed),
            },
            delay: Duration::from_millis(50),
        };
        let store = Arc::new(CacheStore::with_connector(connector, StoreOptions::new()));

        // First operation kicks off the slow connect
        let op = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("k").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // close() joins the in-flight init and tears its backend down
        store.close().await.expect("Failed to close");
        assert!(closed.load(Ordering::SeqCst));

        let _ = op.await.expect("task panicked");
    }
}
