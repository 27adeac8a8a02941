//! Error types for the cache store.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache store.
///
/// All operations return `Result<T>` where `Result` is defined as `std::result::Result<T, Error>`.
/// A cache miss is NOT an error: `get` reports it as a successful `Bson::Null` result.
///
/// The enum is `Clone` because the session initializer memoizes its outcome and
/// replays the same error to every caller that arrives after a failed init.
#[derive(Debug, Clone)]
pub enum Error {
    /// Initial connect or TTL-index creation failed.
    ///
    /// Fatal for the session: the initializer memoizes this error and every
    /// subsequent operation on the same store reports it. Recovery requires
    /// constructing a new store.
    ConnectionError(String),

    /// The supplied connection descriptor cannot be used to reach a collection.
    ///
    /// Raised when a URI does not carry a `mongodb://` or `mongodb+srv://`
    /// scheme, or a handle cannot be bound to the configured collection.
    InvalidBackend(String),

    /// Compressing a binary value failed during `set`.
    ///
    /// The write is aborted; the original value is never stored silently.
    CompressionError(String),

    /// Stored bytes are not a valid compressed payload.
    ///
    /// Surfaced on `get` for entries written through the compression path.
    /// Distinct from a miss: the entry exists but cannot be decoded.
    ///
    /// **Recovery:** evict the entry and rewrite it.
    DecompressionError(String),

    /// Opaque I/O failure from a CRUD call against the backing store.
    ///
    /// Passed through unchanged. Common causes:
    /// - Connection lost mid-operation
    /// - Document exceeds the backing store's single-document size limit
    /// - Server-side write error
    BackendError(String),

    /// Serializing a value into a BSON document failed.
    SerializationError(String),

    /// Deserializing a stored document back into a value failed.
    ///
    /// Indicates corrupted or schema-incompatible data in the collection.
    DeserializationError(String),

    /// Invalid configuration or entry construction input.
    ///
    /// Raised when a TTL is so large the expiry timestamp is not representable,
    /// or store options are inconsistent.
    ConfigError(String),

    /// Operation attempted on a store after `close()`.
    ///
    /// Closed stores do not re-initialize; construct a new store instead.
    StoreClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Error::InvalidBackend(msg) => write!(f, "Invalid backend: {}", msg),
            Error::CompressionError(msg) => write!(f, "Compression error: {}", msg),
            Error::DecompressionError(msg) => write!(f, "Decompression error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::StoreClosed => write!(f, "Store is closed"),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<bson::ser::Error> for Error {
    fn from(e: bson::ser::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<bson::de::Error> for Error {
    fn from(e: bson::de::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::BackendError(format!("MongoDB error: {}", e))
    }
}
