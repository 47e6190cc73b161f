//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror. Backend failures are
//! wrapped with the backend they came from, never reinterpreted.

use thiserror::Error;

use crate::config::BackendKind;

/// Boxed source error carried by [`CacheError::Backend`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for every cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Value could not be serialized into an envelope
    #[error("Encode error: {0}")]
    Encode(String),

    /// Stored bytes are not a valid envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// Typed accessor used on a value of another type
    #[error("Type mismatch for key {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Underlying store failure (I/O, network, corruption)
    #[error("{kind} backend error: {source}")]
    Backend {
        kind: BackendKind,
        #[source]
        source: BoxError,
    },

    /// Some deletions of a bulk operation failed; the rest went through
    #[error("{failed} of {attempted} deletions failed, last error: {source}")]
    PartialDelete {
        failed: usize,
        attempted: usize,
        #[source]
        source: Box<CacheError>,
    },

    /// Unknown backend kind at construction
    #[error("Unsupported cache backend: {0}")]
    UnsupportedBackend(String),

    /// Options cannot be used for the selected backend
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation attempted after close
    #[error("Cache is closed")]
    Closed,
}

impl CacheError {
    /// Wraps any backend-originated error.
    pub fn backend(kind: BackendKind, source: impl Into<BoxError>) -> Self {
        CacheError::Backend {
            kind,
            source: source.into(),
        }
    }

    /// True for absent or expired keys.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Backend Conversions ==
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::backend(BackendKind::Redis, err)
    }
}

impl From<sled::Error> for CacheError {
    fn from(err: sled::Error) -> Self {
        CacheError::backend(BackendKind::Sled, err)
    }
}

macro_rules! redb_error {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for CacheError {
                fn from(err: $ty) -> Self {
                    CacheError::backend(BackendKind::Redb, redb::Error::from(err))
                }
            }
        )+
    };
}

redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<redb::Error> for CacheError {
    fn from(err: redb::Error) -> Self {
        CacheError::backend(BackendKind::Redb, err)
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
