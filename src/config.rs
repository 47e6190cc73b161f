//! Configuration Module
//!
//! Backend selection and per-instance options, loadable from environment
//! variables the same way for every backend.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Path sentinel selecting an in-memory store for the embedded backends.
pub const MEMORY_PATH: &str = ":memory:";

// == Backend Kind ==
/// The storage engines a cache instance can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Networked key-value service
    Redis,
    /// Embedded log-structured store
    Sled,
    /// Embedded ordered-index store
    Redb,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::Sled => "sled",
            BackendKind::Redb => "redb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "sled" => Ok(BackendKind::Sled),
            "redb" => Ok(BackendKind::Redb),
            _ => Err(CacheError::UnsupportedBackend(s.to_string())),
        }
    }
}

// == Options ==
/// Construction-time options for one cache instance.
///
/// Fixed for the lifetime of the instance; reconfiguring means opening a
/// new one. Fields that do not apply to the selected backend are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Redis host
    pub server: String,
    /// Redis port
    pub port: u16,
    /// Redis password, if any
    pub password: Option<String>,
    /// Prefix applied to every key of this instance
    pub prefix: String,
    /// Redis logical database index
    pub db: i64,
    /// On-disk location for sled/redb, or [`MEMORY_PATH`]
    pub path: PathBuf,
}

impl Options {
    /// Returns the defaults for the given backend.
    ///
    /// - redis: `localhost:6379`, prefix `dev`, database 0
    /// - sled: `./sled`, no prefix
    /// - redb: in-memory, no prefix
    pub fn for_backend(kind: BackendKind) -> Self {
        let base = Self::default();
        match kind {
            BackendKind::Redis => Self {
                prefix: "dev".to_string(),
                ..base
            },
            BackendKind::Sled => Self {
                path: PathBuf::from("./sled"),
                ..base
            },
            BackendKind::Redb => base,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// True when `path` is the in-memory sentinel.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 6379,
            password: None,
            prefix: String::new(),
            db: 0,
            path: PathBuf::from(MEMORY_PATH),
        }
    }
}

// == Config ==
/// Backend selection plus its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
    pub options: Options,
}

impl Config {
    /// Loads the configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `redis`, `sled` or `redb` (default: redis)
    /// - `CACHE_SERVER` - Redis host
    /// - `CACHE_PORT` - Redis port
    /// - `CACHE_PASSWORD` - Redis password
    /// - `CACHE_PREFIX` - Key prefix
    /// - `CACHE_DB` - Redis database index
    /// - `CACHE_PATH` - sled/redb location, `:memory:` for in-memory
    ///
    /// Unset or unparseable values fall back to [`Options::for_backend`].
    /// An unknown backend name is an error.
    pub fn from_env() -> Result<Self> {
        let backend = match env::var("CACHE_BACKEND") {
            Ok(name) => name.parse()?,
            Err(_) => BackendKind::Redis,
        };

        let mut options = Options::for_backend(backend);
        if let Ok(server) = env::var("CACHE_SERVER") {
            options.server = server;
        }
        if let Some(port) = env::var("CACHE_PORT").ok().and_then(|v| v.parse().ok()) {
            options.port = port;
        }
        if let Ok(password) = env::var("CACHE_PASSWORD") {
            options.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Ok(prefix) = env::var("CACHE_PREFIX") {
            options.prefix = prefix;
        }
        if let Some(db) = env::var("CACHE_DB").ok().and_then(|v| v.parse().ok()) {
            options.db = db;
        }
        if let Ok(path) = env::var("CACHE_PATH") {
            options.path = PathBuf::from(path);
        }

        Ok(Self { backend, options })
    }
}
