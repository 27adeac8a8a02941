//! Document store backends.
//!
//! [`DocumentBackend`] is the narrow capability surface the cache consumes
//! from its backing document database: keyed reads, upsert-on-key writes,
//! single and bulk deletes, and a TTL index request. Everything else the
//! database can do (queries, transactions, secondary indexes) is out of scope.

use crate::entry::CacheEntry;
use crate::error::Result;
use std::future::Future;

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

pub use memory::{MemoryBackend, MemoryConnector};
#[cfg(feature = "mongo")]
pub use mongo::{MongoBackend, MongoConnector, MongoTarget};

/// A bound cache collection.
///
/// **IMPORTANT:** All methods take `&self`; implementations use interior
/// mutability or cheap cloneable handles so one backend can serve concurrent
/// operations. `Clone + 'static` lets the store hand a handle to background
/// cleanup tasks.
///
/// **ASYNC:** Methods are declared in desugared form so their futures are
/// `Send` and can be driven from spawned tasks; implementations still write
/// plain `async fn`.
pub trait DocumentBackend: Send + Sync + Clone + 'static {
    /// Request the server-side TTL index on `expireAt`.
    ///
    /// Declared with `expireAfterSeconds = 0`: the backing store reaps
    /// documents once `expireAt` has passed. Reads still double-check expiry
    /// because reaping may lag wall clock.
    ///
    /// # Errors
    /// Returns `Err` if the index request is rejected; the session treats
    /// that as a fatal initialization failure.
    fn create_ttl_index(&self) -> impl Future<Output = Result<()>> + Send;

    /// Look up the document for `key`.
    ///
    /// # Returns
    /// - `Ok(Some(entry))` - A document exists (it may still be expired)
    /// - `Ok(None)` - No document for this key
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure.
    fn find_one(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry>>> + Send;

    /// Insert or fully replace the document for `entry.key`.
    ///
    /// `value`, `expireAt`, and `compressed` change atomically in one write.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure, including documents over the
    /// store's single-document size limit.
    fn upsert(&self, entry: CacheEntry) -> impl Future<Output = Result<()>> + Send;

    /// Remove at most one document matching `key`. Absence is not an error.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure.
    fn delete_one(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove every document in the bound collection.
    ///
    /// # Errors
    /// Returns `Err` on backend I/O failure.
    fn delete_many(&self) -> impl Future<Output = Result<()>> + Send;

    /// Release the underlying connection if this layer owns it.
    ///
    /// Backends bound to caller-supplied handles must leave the connection
    /// open; the caller closes what the caller opened.
    ///
    /// # Errors
    /// Returns `Err` if teardown fails.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
