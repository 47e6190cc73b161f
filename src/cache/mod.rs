//! Cache Module
//!
//! The contract every backend implements, the value envelope and the key
//! namespacing shared by the adapters.

mod bulk;
mod entry;
mod key;
mod value;


use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::BackendKind;
use crate::error::{CacheError, Result};

// Re-export public types
pub use bulk::{delete_each, DeleteTally};
pub use entry::{current_timestamp_ms, ttl_millis, CacheEntry, ENVELOPE_VERSION};
pub use key::{escape_glob, KeySpace, SEPARATOR};
pub use value::Value;

// == Public Constants ==
/// Keys collected per delete batch during bulk deletion.
pub const DELETE_BATCH_SIZE: usize = 10_000;

// == Cache Contract ==
/// Capability set shared by every backend.
///
/// Keys are logical keys; the adapter applies the instance prefix. An
/// absent `expires` (or a zero duration) stores the value without
/// expiration.
///
/// Bulk deletes are not atomic with respect to concurrent writers: a key
/// written while `empty`/`empty_by_match` is scanning may or may not be
/// removed.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Backend this instance runs on.
    fn kind(&self) -> BackendKind;

    /// Prefix applied to every key of this instance.
    fn prefix(&self) -> &str;

    /// Returns the value stored under `key`.
    ///
    /// Fails with `NotFound` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value, expires: Option<Duration>) -> Result<()>;

    /// True if `key` is present. Every failure, including a closed cache,
    /// reads as `false`; use [`Cache::get`] to tell them apart.
    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_ok()
    }

    /// Removes `key`. Removing an absent key succeeds.
    async fn forget(&self, key: &str) -> Result<()>;

    /// Removes every key of this instance and returns how many went.
    async fn empty(&self) -> Result<usize> {
        self.empty_by_match("").await
    }

    /// Removes every key of this instance whose logical key starts with
    /// `pattern` and returns how many went.
    async fn empty_by_match(&self, pattern: &str) -> Result<usize>;

    /// Drops entries whose TTL has elapsed and returns how many went.
    /// Backends with native expiration remove nothing but still fail with
    /// `Closed` once closed.
    async fn purge_expired(&self) -> Result<usize>;

    /// Releases the backend handle. Later calls fail with `Closed`; a
    /// second close is a no-op.
    async fn close(&self) -> Result<()>;

    // == Typed Accessors ==
    async fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key).await? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(key, "string", &other)),
        }
    }

    async fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get(key).await?;
        value.as_int().ok_or_else(|| mismatch(key, "int", &value))
    }

    async fn get_float32(&self, key: &str) -> Result<f32> {
        let value = self.get(key).await?;
        value
            .as_float32()
            .ok_or_else(|| mismatch(key, "float32", &value))
    }

    async fn get_float64(&self, key: &str) -> Result<f64> {
        let value = self.get(key).await?;
        value
            .as_float64()
            .ok_or_else(|| mismatch(key, "float64", &value))
    }

    async fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get(key).await?;
        value.as_bool().ok_or_else(|| mismatch(key, "bool", &value))
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        match self.get(key).await? {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch(key, "bytes", &other)),
        }
    }

    async fn get_time(&self, key: &str) -> Result<DateTime<Utc>> {
        let value = self.get(key).await?;
        value.as_time().ok_or_else(|| mismatch(key, "time", &value))
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> CacheError {
    CacheError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}

// == Structured Values ==
/// Stores caller-defined serde types, bincode-encoded inside
/// [`Value::Serialized`].
#[async_trait]
pub trait CacheExt: Cache {
    async fn set_serialized<T>(&self, key: &str, data: &T, expires: Option<Duration>) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let bytes = bincode::serialize(data).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.set(key, Value::Serialized(bytes), expires).await
    }

    async fn get_deserialized<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match self.get(key).await? {
            Value::Serialized(bytes) => {
                bincode::deserialize(&bytes).map_err(|e| CacheError::Decode(e.to_string()))
            }
            other => Err(mismatch(key, "serialized", &other)),
        }
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
