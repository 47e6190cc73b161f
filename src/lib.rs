//! Remember - one cache interface over several storage engines
//!
//! Store typed values under string keys in Redis, sled or redb through the
//! same [`Cache`] contract, with per-instance key prefixes, optional TTLs
//! and prefix-based bulk deletion.

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use backends::{open, open_from_env, open_named, RedbCache, RedisCache, SledCache};
pub use cache::{Cache, CacheEntry, CacheExt, Value};
pub use config::{BackendKind, Config, Options};
pub use error::{CacheError, Result};
pub use tasks::spawn_purge_task;
