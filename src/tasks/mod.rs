//! Background Tasks Module
//!
//! Contains background tasks that run periodically next to a cache.
//!
//! # Tasks
//! - Purge: removes expired entries from backends without native TTL

mod purge;

pub use purge::spawn_purge_task;
