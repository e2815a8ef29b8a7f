use crate::error::{CacheError, CacheResult};
use crate::request::{RequestKey, Response};
use crate::store::{CacheEntry, CacheStorage};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-process cache storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    caches: RwLock<BTreeMap<String, HashMap<RequestKey, CacheEntry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self
            .caches
            .read()
            .await
            .get(name)
            .and_then(|cache| cache.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> CacheResult<()> {
        let mut caches = self.caches.write().await;
        let cache = caches
            .get_mut(name)
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))?;
        cache.insert(key.clone(), CacheEntry::new(key.clone(), response.clone()));
        Ok(())
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        let caches = self.caches.read().await;
        let mut keys: Vec<RequestKey> = caches
            .get(name)
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
