//! Named, versioned response caches
//!
//! A deployment owns exactly one cache, named by its version. Everything it
//! writes lands in that cache; caches left behind by earlier versions are
//! deleted in bulk when a newer version activates.
//!
//! # Backends
//!
//! | Backend | Layout | Lifetime |
//! |---------|--------|----------|
//! | Memory | map of name to entries | process |
//! | Disk | `<root>/<cache name>/<sha256(key)>.entry` | persistent |

mod disk;
pub mod manager;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use disk::DiskStorage;
pub use manager::{CacheStoreManager, ProvisionReport, RetireReport};
pub use memory::MemoryStorage;

use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{CacheError, CacheResult};
use crate::request::{RequestKey, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A stored response together with the key it was stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: RequestKey, response: Response) -> Self {
        Self {
            key,
            response,
            stored_at: Utc::now(),
        }
    }
}

/// Storage for named caches of request/response pairs
///
/// Implementations must be safe to share between concurrently running
/// request tasks.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it empty if absent
    async fn open(&self, name: &str) -> CacheResult<()>;

    /// Names of all existing caches, sorted
    async fn names(&self) -> CacheResult<Vec<String>>;

    /// Whether a cache with this name exists
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete a cache and all its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Look up an entry. A missing cache is the same as a missing entry.
    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<CacheEntry>>;

    /// Insert or overwrite an entry. Fails with `CacheNotFound` when the
    /// cache was never opened or has been deleted.
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> CacheResult<()>;

    /// Keys stored in a cache, sorted
    async fn keys(&self, name: &str) -> CacheResult<Vec<RequestKey>>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Create the storage backend selected in the configuration
pub fn create_storage(config: &Config) -> Arc<dyn CacheStorage> {
    match config.storage.backend {
        StorageBackend::Disk => Arc::new(DiskStorage::new(ConfigManager::storage_dir(config))),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    }
}

/// Check that a cache name can be used as a single path segment
pub fn validate_cache_name(name: &str) -> CacheResult<()> {
    let invalid = |reason: &str| {
        Err(CacheError::InvalidCacheName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name.len() > 128 {
        return invalid("name is longer than 128 characters");
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return invalid("name must not start with '.'");
    }
    if name.contains(['/', '\\']) || name.chars().any(char::is_control) {
        return invalid("name must not contain path separators or control characters");
    }
    Ok(())
}
