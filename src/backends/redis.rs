//! Redis Backend
//!
//! Networked cache over a multiplexed Redis connection. Expiration uses
//! Redis' native millisecond TTL; bulk deletes enumerate keys with SCAN.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{ttl_millis, Cache, CacheEntry, DeleteTally, KeySpace, Value};
use crate::config::{BackendKind, Options};
use crate::error::{CacheError, Result};

/// Hint for how many keys each SCAN page examines.
const SCAN_COUNT: usize = 1000;

// == Redis Cache ==
/// Cache backed by a Redis server.
pub struct RedisCache {
    conn: RwLock<Option<ConnectionManager>>,
    keys: KeySpace,
}

impl RedisCache {
    /// Connects to the server named by `options`.
    ///
    /// Uses `server`, `port`, `password`, `db` and `prefix`.
    pub async fn open(options: &Options) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(options.server.clone(), options.port),
            redis: RedisConnectionInfo {
                db: options.db,
                password: options.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        let conn = ConnectionManager::new(client).await?;

        info!(
            server = %options.server,
            port = options.port,
            db = options.db,
            prefix = %options.prefix,
            "redis cache opened"
        );

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            keys: KeySpace::new(options.prefix.clone()),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        self.conn.read().await.clone().ok_or(CacheError::Closed)
    }

    /// Collects every key matching `glob`, driving SCAN page by page.
    ///
    /// Any failed page aborts before anything is deleted. Keys are kept as
    /// raw bytes and deduplicated, since SCAN may repeat a key.
    async fn scan_keys(conn: &mut ConnectionManager, glob: &str) -> Result<Vec<Vec<u8>>> {
        let mut cursor: u64 = 0;
        let mut matched = Vec::new();
        loop {
            let (next, page): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(glob)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(conn)
                .await?;
            matched.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        matched.sort_unstable();
        matched.dedup();
        Ok(matched)
    }

    /// Deletes each key individually, continuing past failures.
    async fn delete_all(&self, conn: &mut ConnectionManager, keys: Vec<Vec<u8>>) -> Result<usize> {
        let mut tally = DeleteTally::new();
        for key in keys {
            let outcome = conn.del::<_, usize>(&key).await.map_err(CacheError::from);
            if let Err(err) = &outcome {
                let full = String::from_utf8_lossy(&key);
                let logical = self.keys.strip(&full).unwrap_or(&full);
                warn!(key = %logical, error = %err, "redis delete failed");
            }
            tally.record(1, outcome);
        }
        tally.finish()
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn prefix(&self) -> &str {
        self.keys.prefix()
    }

    async fn get(&self, key: &str) -> Result<Value> {
        let mut conn = self.conn().await?;
        let raw: Option<Vec<u8>> = conn.get(self.keys.namespaced(key)).await?;
        let Some(raw) = raw else {
            debug!(key, "redis miss");
            return Err(CacheError::NotFound(key.to_string()));
        };

        let entry = CacheEntry::decode_for(key, &raw)?;
        // Native TTL normally removes the key first
        if entry.is_expired() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        debug!(key, ttl_ms = ?entry.ttl_remaining_ms(), "redis hit");
        Ok(entry.value)
    }

    async fn set(&self, key: &str, value: Value, expires: Option<Duration>) -> Result<()> {
        let mut conn = self.conn().await?;
        let encoded = CacheEntry::new(key, value, expires).encode()?;
        let full = self.keys.namespaced(key);

        match ttl_millis(expires) {
            Some(ms) => conn.pset_ex::<_, _, ()>(full, encoded, ms).await?,
            None => conn.set::<_, _, ()>(full, encoded).await?,
        }
        debug!(key, ttl_ms = ?ttl_millis(expires), "redis set");
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.keys.namespaced(key)).await?;
        debug!(key, "redis forget");
        Ok(())
    }

    async fn empty_by_match(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn().await?;
        let glob = self.keys.glob(pattern);

        let matched = Self::scan_keys(&mut conn, &glob).await?;

        debug!(pattern = %glob, count = matched.len(), "redis bulk delete");
        self.delete_all(&mut conn, matched).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        // Native TTL already removed them
        self.conn().await?;
        Ok(0)
    }

    async fn close(&self) -> Result<()> {
        if self.conn.write().await.take().is_some() {
            info!(prefix = %self.keys.prefix(), "redis cache closed");
        }
        Ok(())
    }
}
