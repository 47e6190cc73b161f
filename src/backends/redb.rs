//! Redb Backend
//!
//! Embedded ordered-index store with ACID transactions:
//! - read transactions for `get` and key collection
//! - write transactions for `set`, `forget` and bulk deletes
//!
//! Prefix deletes ascend from the scope start in a read transaction,
//! stop at the first key outside the scope, then remove the collected keys
//! in a single write transaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, delete_each, Cache, CacheEntry, KeySpace, Value};
use crate::config::{BackendKind, Options};
use crate::error::{CacheError, Result};

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("remember_entries");

// == Redb Cache ==
/// Cache backed by an embedded redb database.
pub struct RedbCache {
    db: RwLock<Option<Arc<Database>>>,
    keys: KeySpace,
}

impl RedbCache {
    /// Opens (or creates) the database file at `options.path`, or an
    /// in-memory database for `:memory:`.
    pub async fn open(options: &Options) -> Result<Self> {
        if !options.is_in_memory() && options.path.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "redb requires a path or :memory:".to_string(),
            ));
        }

        let in_memory = options.is_in_memory();
        let path = options.path.clone();
        let db = tokio::task::spawn_blocking(move || -> Result<Database> {
            let db = if in_memory {
                Database::builder().create_with_backend(InMemoryBackend::new())?
            } else {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| CacheError::backend(BackendKind::Redb, e))?;
                }
                Database::create(&path)?
            };

            // Read transactions fail on a table that was never written
            let txn = db.begin_write()?;
            txn.open_table(ENTRIES)?;
            txn.commit()?;
            Ok(db)
        })
        .await
        .map_err(|e| CacheError::backend(BackendKind::Redb, e))??;

        info!(path = %options.path.display(), prefix = %options.prefix, "redb cache opened");

        Ok(Self {
            db: RwLock::new(Some(Arc::new(db))),
            keys: KeySpace::new(options.prefix.clone()),
        })
    }

    /// Wraps an already open database, so several prefixes can share it.
    ///
    /// Creates the entries table if needed.
    pub async fn from_database(db: Arc<Database>, prefix: impl Into<String>) -> Result<Self> {
        let shared = Arc::clone(&db);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let txn = shared.begin_write()?;
            txn.open_table(ENTRIES)?;
            txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::backend(BackendKind::Redb, e))??;

        Ok(Self {
            db: RwLock::new(Some(db)),
            keys: KeySpace::new(prefix),
        })
    }

    /// Shared handle to the underlying database, if still open.
    pub async fn database(&self) -> Option<Arc<Database>> {
        self.db.read().await.clone()
    }

    /// Runs `f` against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.db.read().await.clone().ok_or(CacheError::Closed)?;
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CacheError::backend(BackendKind::Redb, e))?
    }
}

/// Collects keys under `scope` whose entry satisfies `select`.
fn collect_scope<F>(db: &Database, scope: &str, select: F) -> Result<Vec<String>>
where
    F: Fn(&[u8]) -> bool,
{
    let txn = db.begin_read()?;
    let table = txn.open_table(ENTRIES)?;

    let mut keys = Vec::new();
    for item in table.range(scope..)? {
        let (key, value) = item?;
        let key = key.value();
        if !key.starts_with(scope) {
            break;
        }
        if select(value.value()) {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

/// Removes `keys` in one write transaction, continuing past failed removes.
fn delete_keys(db: &Database, keys: Vec<String>) -> Result<usize> {
    if keys.is_empty() {
        return Ok(0);
    }

    let txn = db.begin_write()?;
    let deleted = {
        let mut table = txn.open_table(ENTRIES)?;
        delete_each(keys, |key| match table.remove(key.as_str()) {
            Ok(removed) => Ok(usize::from(removed.is_some())),
            Err(err) => {
                warn!(key = %key, error = %err, "redb delete failed");
                Err(CacheError::from(err))
            }
        })
    };
    txn.commit()?;
    deleted
}

#[async_trait]
impl Cache for RedbCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Redb
    }

    fn prefix(&self) -> &str {
        self.keys.prefix()
    }

    async fn get(&self, key: &str) -> Result<Value> {
        let logical = key.to_string();
        let full = self.keys.namespaced(key);

        let entry = self
            .with_db(move |db| {
                let txn = db.begin_read()?;
                let table = txn.open_table(ENTRIES)?;
                let Some(raw) = table.get(full.as_str())? else {
                    return Ok(None);
                };
                let entry = CacheEntry::decode_for(&logical, raw.value())?;
                Ok(Some(entry))
            })
            .await?;

        match entry {
            Some(entry) if !entry.is_expired() => {
                debug!(key, ttl_ms = ?entry.ttl_remaining_ms(), "redb hit");
                Ok(entry.value)
            }
            Some(_) => {
                debug!(key, "redb expired");
                if let Err(err) = self.remove_expired(key).await {
                    warn!(key, error = %err, "failed to remove expired entry");
                }
                Err(CacheError::NotFound(key.to_string()))
            }
            None => {
                debug!(key, "redb miss");
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    async fn set(&self, key: &str, value: Value, expires: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(key, value, expires);
        let encoded = entry.encode()?;
        let full = self.keys.namespaced(key);

        self.with_db(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(ENTRIES)?;
                table.insert(full.as_str(), encoded.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await?;

        debug!(key, expires_at = ?entry.expires_at, "redb set");
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let full = self.keys.namespaced(key);
        self.with_db(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(ENTRIES)?;
                table.remove(full.as_str())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await?;

        debug!(key, "redb forget");
        Ok(())
    }

    async fn empty_by_match(&self, pattern: &str) -> Result<usize> {
        let scope = self.keys.scope(pattern);
        let deleted = self
            .with_db(move |db| {
                let keys = collect_scope(db, &scope, |_| true)?;
                delete_keys(db, keys)
            })
            .await?;

        debug!(pattern, deleted, "redb bulk delete");
        Ok(deleted)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let scope = self.keys.scope("");
        let now = current_timestamp_ms();

        self.with_db(move |db| {
            let keys = collect_scope(db, &scope, |raw| {
                CacheEntry::decode(raw)
                    .map(|entry| entry.is_expired_at(now))
                    .unwrap_or(false)
            })?;
            delete_keys(db, keys)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        if self.db.write().await.take().is_some() {
            info!(prefix = %self.keys.prefix(), "redb cache closed");
        }
        Ok(())
    }
}

impl RedbCache {
    /// Removes `key` only if its stored entry is still expired.
    async fn remove_expired(&self, key: &str) -> Result<()> {
        let full = self.keys.namespaced(key);
        let now = current_timestamp_ms();

        self.with_db(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(ENTRIES)?;
                let expired = match table.get(full.as_str())? {
                    Some(raw) => CacheEntry::decode(raw.value())
                        .map(|entry| entry.is_expired_at(now))
                        .unwrap_or(false),
                    None => false,
                };
                if expired {
                    table.remove(full.as_str())?;
                }
            }
            txn.commit()?;
            Ok(())
        })
        .await
    }
}
