//! Backends Module
//!
//! One [`Cache`] implementation per storage engine, selected once at
//! construction.
//!
//! # Backends
//! - [`RedisCache`]: networked, native TTL
//! - [`SledCache`]: embedded log-structured store
//! - [`RedbCache`]: embedded ordered-index store

mod redb;
mod redis;
mod sled;

pub use self::redb::RedbCache;
pub use self::redis::RedisCache;
pub use self::sled::SledCache;

use tracing::debug;

use crate::cache::Cache;
use crate::config::{BackendKind, Config, Options};
use crate::error::Result;

/// Opens a cache of the given kind.
///
/// # Example
/// ```no_run
/// use remember::{open, BackendKind, Cache, Options};
///
/// # async fn run() -> remember::Result<()> {
/// let cache = open(BackendKind::Redb, Options::for_backend(BackendKind::Redb)).await?;
/// cache.set("greeting", "hello".into(), None).await?;
/// assert_eq!(cache.get_string("greeting").await?, "hello");
/// cache.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn open(kind: BackendKind, options: Options) -> Result<Box<dyn Cache>> {
    debug!(backend = %kind, "opening cache");
    let cache: Box<dyn Cache> = match kind {
        BackendKind::Redis => Box::new(RedisCache::open(&options).await?),
        BackendKind::Sled => Box::new(SledCache::open(&options).await?),
        BackendKind::Redb => Box::new(RedbCache::open(&options).await?),
    };
    Ok(cache)
}

/// Opens a cache by backend name (`redis`, `sled`, `redb`).
///
/// Unknown names fail with `UnsupportedBackend`.
pub async fn open_named(kind: &str, options: Options) -> Result<Box<dyn Cache>> {
    open(kind.parse()?, options).await
}

/// Opens the cache described by the `CACHE_*` environment variables.
pub async fn open_from_env() -> Result<Box<dyn Cache>> {
    let config = Config::from_env()?;
    open(config.backend, config.options).await
}
