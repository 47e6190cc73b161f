//! Sled Backend
//!
//! Embedded log-structured store. sled has no native TTL, so expiry lives
//! in the envelope: expired entries read as missing and are removed
//! lazily or by [`Cache::purge_expired`].
//!
//! Bulk deletion is two-phase: keys are collected from a prefix scan into
//! batches of at most [`DELETE_BATCH_SIZE`], and each full batch is
//! applied atomically before scanning continues.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp_ms, Cache, CacheEntry, DeleteTally, KeySpace, Value, DELETE_BATCH_SIZE,
};
use crate::config::{BackendKind, Options};
use crate::error::{CacheError, Result};

// == Sled Cache ==
/// Cache backed by an embedded sled database.
pub struct SledCache {
    db: RwLock<Option<sled::Db>>,
    keys: KeySpace,
}

impl SledCache {
    /// Opens (or creates) the database at `options.path`.
    ///
    /// The `:memory:` path opens a temporary database that is discarded on
    /// close.
    pub async fn open(options: &Options) -> Result<Self> {
        let mut config = sled::Config::new();
        if options.is_in_memory() {
            config = config.temporary(true);
        } else if options.path.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "sled requires a path or :memory:".to_string(),
            ));
        } else {
            config = config.path(&options.path);
        }

        let db = tokio::task::spawn_blocking(move || config.open())
            .await
            .map_err(|e| CacheError::backend(BackendKind::Sled, e))??;

        info!(path = %options.path.display(), prefix = %options.prefix, "sled cache opened");

        Ok(Self {
            db: RwLock::new(Some(db)),
            keys: KeySpace::new(options.prefix.clone()),
        })
    }

    /// Wraps an already open database, so several prefixes can share it.
    pub fn from_db(db: sled::Db, prefix: impl Into<String>) -> Self {
        Self {
            db: RwLock::new(Some(db)),
            keys: KeySpace::new(prefix),
        }
    }

    /// Runs `f` against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(sled::Db) -> Result<T> + Send + 'static,
    {
        let db = self.db.read().await.clone().ok_or(CacheError::Closed)?;
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| CacheError::backend(BackendKind::Sled, e))?
    }
}

/// Deletes every key under `scope` whose entry satisfies `select`.
///
/// Batches are flushed as they fill; a failed batch does not stop later
/// ones, and the first pass error is reported once the scan finishes.
fn delete_scope<F>(db: &sled::Db, scope: &[u8], select: F) -> Result<usize>
where
    F: Fn(&[u8]) -> bool,
{
    let mut batch = Vec::with_capacity(DELETE_BATCH_SIZE.min(1024));
    let mut tally = DeleteTally::new();

    let mut flush = |keys: &mut Vec<sled::IVec>| {
        let count = keys.len();
        let mut ops = sled::Batch::default();
        for key in keys.drain(..) {
            ops.remove(key);
        }
        let outcome = db.apply_batch(ops).map(|()| count).map_err(CacheError::from);
        if let Err(err) = &outcome {
            warn!(count, error = %err, "sled batch delete failed");
        }
        tally.record(count, outcome);
    };

    for item in db.scan_prefix(scope) {
        let (key, value) = item?;
        if !select(&value) {
            continue;
        }
        batch.push(key);
        if batch.len() == DELETE_BATCH_SIZE {
            flush(&mut batch);
        }
    }
    if !batch.is_empty() {
        flush(&mut batch);
    }

    tally.finish()
}

#[async_trait]
impl Cache for SledCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Sled
    }

    fn prefix(&self) -> &str {
        self.keys.prefix()
    }

    async fn get(&self, key: &str) -> Result<Value> {
        let logical = key.to_string();
        let full = self.keys.namespaced(key);

        self.with_db(move |db| {
            let Some(raw) = db.get(full.as_bytes())? else {
                debug!(key = %logical, "sled miss");
                return Err(CacheError::NotFound(logical));
            };

            let entry = CacheEntry::decode_for(&logical, &raw)?;
            if entry.is_expired() {
                // Only remove the exact version we read
                if let Err(err) = db.compare_and_swap(full.as_bytes(), Some(raw), None::<&[u8]>) {
                    warn!(key = %logical, error = %err, "failed to remove expired entry");
                }
                debug!(key = %logical, "sled expired");
                return Err(CacheError::NotFound(logical));
            }

            debug!(key = %logical, ttl_ms = ?entry.ttl_remaining_ms(), "sled hit");
            Ok(entry.value)
        })
        .await
    }

    async fn set(&self, key: &str, value: Value, expires: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(key, value, expires);
        let encoded = entry.encode()?;
        let full = self.keys.namespaced(key);

        self.with_db(move |db| {
            db.insert(full.as_bytes(), encoded)?;
            Ok(())
        })
        .await?;

        debug!(key, expires_at = ?entry.expires_at, "sled set");
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let full = self.keys.namespaced(key);
        self.with_db(move |db| {
            db.remove(full.as_bytes())?;
            Ok(())
        })
        .await?;

        debug!(key, "sled forget");
        Ok(())
    }

    async fn empty_by_match(&self, pattern: &str) -> Result<usize> {
        let scope = self.keys.scope(pattern);
        let deleted = self
            .with_db(move |db| delete_scope(&db, scope.as_bytes(), |_| true))
            .await?;

        debug!(pattern, deleted, "sled bulk delete");
        Ok(deleted)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let scope = self.keys.scope("");
        let now = current_timestamp_ms();

        self.with_db(move |db| {
            delete_scope(&db, scope.as_bytes(), |raw| {
                CacheEntry::decode(raw)
                    .map(|entry| entry.is_expired_at(now))
                    .unwrap_or(false)
            })
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let Some(db) = self.db.write().await.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || db.flush())
            .await
            .map_err(|e| CacheError::backend(BackendKind::Sled, e))??;
        info!(prefix = %self.keys.prefix(), "sled cache closed");
        Ok(())
    }
}
