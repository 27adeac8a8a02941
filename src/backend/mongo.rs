//! MongoDB document backend.
//!
//! Covers both halves of connection establishment: the resolver that
//! classifies the caller-supplied descriptor ([`MongoTarget`]) and the bound
//! backend performing CRUD against one collection ([`MongoBackend`]).
//!
//! Ownership rule: the backend shuts down the client on `close()` only when
//! it opened the connection itself (URI or config path). A collection,
//! database, or client handle supplied by the caller stays open - the caller
//! closes what the caller opened.

use super::DocumentBackend;
use crate::config::{CacheOptions, ConnectionOptions};
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::session::Connect;
use bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Connection descriptor accepted by the store constructor.
///
/// Replaces runtime capability probing with an explicit tagged union; the
/// caller states which handle shape it is passing. Specificity order
/// (collection over database over client over config) is inherent in the
/// variant chosen.
#[derive(Clone, Default)]
pub enum MongoTarget {
    /// Connect from the host/port/credentials in the store options; this
    /// layer opens (and owns) the client. The default when no descriptor is
    /// supplied.
    #[default]
    Options,
    /// Connection string; this layer opens (and owns) the client.
    Uri(String),
    /// Ready-made collection handle, used as-is. Caller-owned.
    Collection(Collection<Document>),
    /// Database handle; the collection is opened by its configured name.
    /// Caller-owned.
    Database(Database),
    /// Client handle; database and collection are opened by their configured
    /// names. Caller-owned.
    Client(Client),
    /// Plain connection parameters; a URI is built from them and this layer
    /// owns the resulting client. Supersedes connection fields given in the
    /// store options.
    Config(ConnectionOptions),
}

impl From<&str> for MongoTarget {
    fn from(uri: &str) -> Self {
        MongoTarget::Uri(uri.to_string())
    }
}

impl From<String> for MongoTarget {
    fn from(uri: String) -> Self {
        MongoTarget::Uri(uri)
    }
}

impl From<Collection<Document>> for MongoTarget {
    fn from(collection: Collection<Document>) -> Self {
        MongoTarget::Collection(collection)
    }
}

impl From<Database> for MongoTarget {
    fn from(database: Database) -> Self {
        MongoTarget::Database(database)
    }
}

impl From<Client> for MongoTarget {
    fn from(client: Client) -> Self {
        MongoTarget::Client(client)
    }
}

impl From<ConnectionOptions> for MongoTarget {
    fn from(options: ConnectionOptions) -> Self {
        MongoTarget::Config(options)
    }
}

fn validate_uri(uri: &str) -> Result<()> {
    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        Ok(())
    } else {
        Err(Error::InvalidBackend(format!(
            "expected a mongodb:// or mongodb+srv:// URI, got {:?}",
            uri
        )))
    }
}

/// Resolver normalizing every [`MongoTarget`] to a bound collection.
///
/// Performs no I/O for caller-supplied handles; only the URI and config
/// paths connect, and only those yield an owned client.
pub struct MongoConnector {
    target: MongoTarget,
    cache: CacheOptions,
    connection: ConnectionOptions,
}

impl MongoConnector {
    pub fn new(target: MongoTarget, cache: CacheOptions, connection: ConnectionOptions) -> Self {
        MongoConnector {
            target,
            cache,
            connection,
        }
    }

    async fn open_client(&self, uri: &str) -> Result<Client> {
        validate_uri(uri)?;
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| Error::ConnectionError(format!("MongoDB connect failed: {}", e)))?;
        info!("✓ MongoDB backend initialized from URI");
        Ok(client)
    }

    fn bind(&self, client: &Client) -> Collection<CacheEntry> {
        client
            .database(&self.cache.database)
            .collection(&self.cache.collection)
    }
}

impl Connect for MongoConnector {
    type Backend = MongoBackend;

    async fn connect(&self) -> Result<MongoBackend> {
        match &self.target {
            MongoTarget::Collection(collection) => Ok(MongoBackend::caller_owned(
                collection.clone_with_type::<CacheEntry>(),
            )),
            MongoTarget::Database(database) => Ok(MongoBackend::caller_owned(
                database.collection(&self.cache.collection),
            )),
            MongoTarget::Client(client) => Ok(MongoBackend::caller_owned(self.bind(client))),
            MongoTarget::Options => {
                let client = self.open_client(&self.connection.uri()).await?;
                let collection = self.bind(&client);
                Ok(MongoBackend::owned(collection, client))
            }
            MongoTarget::Uri(uri) => {
                let client = self.open_client(uri).await?;
                let collection = self.bind(&client);
                Ok(MongoBackend::owned(collection, client))
            }
            MongoTarget::Config(options) => {
                let client = self.open_client(&options.uri()).await?;
                let collection = self.bind(&client);
                Ok(MongoBackend::owned(collection, client))
            }
        }
    }
}

/// One bound cache collection plus the ownership record for its client.
#[derive(Clone, Debug)]
pub struct MongoBackend {
    collection: Collection<CacheEntry>,
    // Some only when this layer opened the connection; taken on close
    owned_client: Arc<Mutex<Option<Client>>>,
}

impl MongoBackend {
    fn caller_owned(collection: Collection<CacheEntry>) -> Self {
        MongoBackend {
            collection,
            owned_client: Arc::new(Mutex::new(None)),
        }
    }

    fn owned(collection: Collection<CacheEntry>, client: Client) -> Self {
        MongoBackend {
            collection,
            owned_client: Arc::new(Mutex::new(Some(client))),
        }
    }

    /// Whether `close()` would shut down the underlying client.
    pub async fn owns_client(&self) -> bool {
        self.owned_client.lock().await.is_some()
    }
}

impl DocumentBackend for MongoBackend {
    async fn create_ttl_index(&self) -> Result<()> {
        let model = IndexModel::builder()
            .keys(doc! { "expireAt": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();

        self.collection
            .create_index(model)
            .await
            .map_err(|e| Error::BackendError(format!("Mongo CREATE_INDEX failed: {}", e)))?;

        debug!("✓ Mongo TTL index declared on expireAt");
        Ok(())
    }

    async fn find_one(&self, key: &str) -> Result<Option<CacheEntry>> {
        let found = self
            .collection
            .find_one(doc! { "key": key })
            .await
            .map_err(|e| Error::BackendError(format!("Mongo FIND failed for key {}: {}", key, e)))?;

        if found.is_some() {
            debug!("✓ Mongo FIND {} -> HIT", key);
        } else {
            debug!("✓ Mongo FIND {} -> MISS", key);
        }

        Ok(found)
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let key = entry.key.clone();

        // Full replacement, not $set: a $set payload omitting an absent
        // `compressed` would leave a stale flag from an earlier compressed
        // write, and the next read would try to gunzip a plain value.
        self.collection
            .replace_one(doc! { "key": &key }, &entry)
            .upsert(true)
            .await
            .map_err(|e| Error::BackendError(format!("Mongo UPSERT failed for key {}: {}", key, e)))?;

        debug!("✓ Mongo UPSERT {}", key);
        Ok(())
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "key": key })
            .await
            .map_err(|e| {
                Error::BackendError(format!("Mongo DELETE failed for key {}: {}", key, e))
            })?;

        debug!("✓ Mongo DELETE {}", key);
        Ok(())
    }

    async fn delete_many(&self) -> Result<()> {
        self.collection
            .delete_many(doc! {})
            .await
            .map_err(|e| Error::BackendError(format!("Mongo DELETE_MANY failed: {}", e)))?;

        warn!("⚠ Mongo DELETE_MANY executed - collection cleared!");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let client = self.owned_client.lock().await.take();
        match client {
            Some(client) => {
                client.shutdown().await;
                debug!("✓ Mongo connection closed");
            }
            None => {
                // Caller-owned client: leave the connection alone
                debug!("✓ Mongo close skipped for caller-owned client");
            }
        }
        Ok(())
    }
}
