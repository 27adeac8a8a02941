//! In-process document backend (thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Behaves like a real backing store between TTL-reaper runs: expired
//! documents stay visible to `find_one`, so the store layer's client-side
//! expiry double-check is exercised instead of masked.

use super::DocumentBackend;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::session::Connect;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe in-process document backend.
///
/// Intended for tests and single-process deployments where a real MongoDB is
/// overkill. Shares its map across clones, like a database handle.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    documents: Arc<DashMap<String, CacheEntry>>,
    max_document_size: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            documents: Arc::new(DashMap::new()),
            max_document_size: None,
        }
    }

    /// Cap the serialized size of a single document.
    ///
    /// Emulates the backing store's per-document limit (16MB for MongoDB) so
    /// oversize behavior can be tested without a server.
    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = Some(bytes);
        self
    }

    /// Current number of stored documents, expired ones included.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBackend for MemoryBackend {
    async fn create_ttl_index(&self) -> Result<()> {
        // Nothing to declare: expiry is enforced by the store's double-check
        debug!("✓ Memory TTL index request acknowledged");
        Ok(())
    }

    async fn find_one(&self, key: &str) -> Result<Option<CacheEntry>> {
        let found = self.documents.get(key).map(|entry| entry.value().clone());
        if found.is_some() {
            debug!("✓ Memory FIND {} -> HIT", key);
        } else {
            debug!("✓ Memory FIND {} -> MISS", key);
        }
        Ok(found)
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        if let Some(limit) = self.max_document_size {
            let size = bson::to_vec(&entry)?.len();
            if size > limit {
                return Err(Error::BackendError(format!(
                    "document of {} bytes exceeds the {} byte limit",
                    size, limit
                )));
            }
        }

        debug!("✓ Memory UPSERT {}", entry.key);
        self.documents.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        self.documents.remove(key);
        debug!("✓ Memory DELETE {}", key);
        Ok(())
    }

    async fn delete_many(&self) -> Result<()> {
        self.documents.clear();
        warn!("⚠ Memory DELETE_MANY executed - collection cleared!");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Nothing owned beyond process memory
        Ok(())
    }
}

/// Connector binding a [`MemoryBackend`], counting how many times the
/// connect-and-bind sequence actually ran.
///
/// The counter is the observable for the single-flight guarantee: N
/// concurrent first operations must leave it at exactly 1.
pub struct MemoryConnector {
    backend: MemoryBackend,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(backend: MemoryBackend) -> Self {
        MemoryConnector {
            backend,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of completed connect calls.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Shared handle to the counter, for asserting after the connector has
    /// been moved into a store.
    pub fn connect_count_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

impl Connect for MemoryConnector {
    type Backend = MemoryBackend;

    async fn connect(&self) -> Result<MemoryBackend> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone())
    }
}
