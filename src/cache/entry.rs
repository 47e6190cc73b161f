//! Cache Entry Module
//!
//! The keyed envelope every backend stores, its binary codec, and the TTL
//! arithmetic shared by the adapters.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cache::Value;
use crate::error::{CacheError, Result};

/// Leading byte of every encoded envelope.
pub const ENVELOPE_VERSION: u8 = 1;

// == Cache Entry ==
/// A single logical key and its value, plus expiry metadata.
///
/// Built for one `set`, encoded, and recovered by the matching `get`.
/// Only the encoded bytes are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The logical (un-prefixed) key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry with an optional TTL.
    ///
    /// A zero TTL means no expiration. Non-zero TTLs are rounded up to
    /// whole milliseconds, see [`ttl_millis`].
    pub fn new(key: impl Into<String>, value: Value, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_millis(ttl).map(|ttl| now.saturating_add(ttl));

        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal
    /// to its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    // == Codec ==
    /// Encodes the entry: version byte followed by the bincode payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let size = bincode::serialized_size(self).map_err(|e| CacheError::Encode(e.to_string()))?;
        let mut buf = Vec::with_capacity(1 + size as usize);
        buf.push(ENVELOPE_VERSION);
        bincode::serialize_into(&mut buf, self).map_err(|e| CacheError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes bytes produced by [`CacheEntry::encode`].
    ///
    /// Fails with `Decode` on empty, truncated, trailing or foreign input.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (version, payload) = bytes
            .split_first()
            .ok_or_else(|| CacheError::Decode("empty envelope".to_string()))?;
        if *version != ENVELOPE_VERSION {
            return Err(CacheError::Decode(format!(
                "unknown envelope version {version}"
            )));
        }

        let entry: CacheEntry =
            bincode::deserialize(payload).map_err(|e| CacheError::Decode(e.to_string()))?;

        let used = bincode::serialized_size(&entry).map_err(|e| CacheError::Decode(e.to_string()))?;
        if used as usize != payload.len() {
            return Err(CacheError::Decode(format!(
                "{} trailing bytes after envelope",
                payload.len() - used as usize
            )));
        }

        Ok(entry)
    }

    /// Decodes an envelope and checks it belongs to `key`.
    pub fn decode_for(key: &str, bytes: &[u8]) -> Result<Self> {
        let entry = Self::decode(bytes)?;
        if entry.key != key {
            return Err(CacheError::Decode(format!(
                "envelope holds key {:?}, expected {:?}",
                entry.key, key
            )));
        }
        Ok(entry)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Normalizes an optional TTL to whole milliseconds.
///
/// `None` and zero mean no expiration. Anything else rounds up, so a
/// sub-millisecond TTL becomes 1 ms rather than "never".
pub fn ttl_millis(ttl: Option<Duration>) -> Option<u64> {
    let ttl = ttl.filter(|d| !d.is_zero())?;
    let whole = ttl.as_millis();
    let rounded = if ttl.subsec_nanos() % 1_000_000 != 0 {
        whole + 1
    } else {
        whole
    };
    Some(u64::try_from(rounded).unwrap_or(u64::MAX).max(1))
}
