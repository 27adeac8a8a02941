//! # cacheman-mongo
//!
//! A MongoDB-backed cache store with per-entry TTL expiration and optional
//! transparent gzip compression of binary values. Designed as a pluggable
//! backend behind a higher-level caching facade.
//!
//! ## Features
//!
//! - **Lazy sessions:** the connection, collection binding, and TTL-index
//!   request run exactly once, on first use, no matter how many operations
//!   race - success and failure alike are memoized for the store's lifetime
//! - **Flexible binding:** connect from a URI or bind to a caller-supplied
//!   collection, database, or client handle ([`MongoTarget`]); caller-owned
//!   connections are never closed by this crate
//! - **TTL double-check:** entries carry an absolute `expireAt`, reaped
//!   server-side by a TTL index and re-checked client-side on every read
//! - **Transparent compression:** binary values can be gzip-compressed on
//!   write and are decompressed on read; the caller never sees the
//!   compressed representation
//! - **Swappable backends:** [`DocumentBackend`] abstracts the narrow
//!   CRUD+index surface; an in-process [`backend::MemoryBackend`] ships for
//!   tests and single-process use
//!
//! ## Quick start
//!
//! ```no_run
//! use cacheman_mongo::{MongoStore, StoreOptions};
//! use bson::Bson;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> cacheman_mongo::Result<()> {
//!     let store = MongoStore::new(
//!         "mongodb://127.0.0.1:27017",
//!         StoreOptions::new()
//!             .database("app")
//!             .collection("cache")
//!             .compression(true),
//!     );
//!
//!     store
//!         .set("user:42", Bson::String("alice".into()), Some(Duration::from_secs(300)))
//!         .await?;
//!
//!     let value = store.get("user:42").await?;
//!     assert_eq!(value, Bson::String("alice".into()));
//!
//!     store.del("user:42").await?;
//!     store.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Miss semantics
//!
//! A miss is a successful `Bson::Null` result, never an error. A stored
//! `Null` reads back exactly like a miss; see [`CacheStore::get`].

#[macro_use]
extern crate log;

pub mod backend;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use backend::DocumentBackend;
#[cfg(feature = "mongo")]
pub use backend::mongo::MongoTarget;
pub use config::{CacheOptions, ConnectionOptions, StoreOptions, DEFAULT_TTL};
pub use entry::CacheEntry;
pub use error::{Error, Result};
pub use session::{Connect, SessionGate};
pub use store::CacheStore;
#[cfg(feature = "mongo")]
pub use store::MongoStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
