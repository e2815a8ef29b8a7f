//! Cache store lifecycle: seeding the current cache and retiring old ones

use crate::assets::AssetList;
use crate::error::{CacheError, CacheResult};
use crate::request::{Request, RequestKey, Response};
use crate::store::{validate_cache_name, CacheEntry, CacheStorage};
use crate::transport::Transport;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of assets fetched, or caches deleted, at once
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of seeding the current cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub cache_name: String,
    /// Assets stored, in asset list order
    pub seeded: Vec<String>,
    /// Assets that could not be fetched or stored, with the reason
    pub failed: Vec<(String, String)>,
}

impl ProvisionReport {
    /// Whether every asset was seeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of deleting caches that belong to other versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetireReport {
    /// The cache that was kept
    pub kept: String,
    pub deleted: Vec<String>,
    /// Caches that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
}

impl RetireReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// Owns the current version's cache
///
/// Shared between request tasks behind an `Arc`; all state lives in the
/// storage backend.
pub struct CacheStoreManager {
    storage: Arc<dyn CacheStorage>,
    current: String,
    assets: AssetList,
    concurrency: usize,
}

impl CacheStoreManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        current: impl Into<String>,
        assets: AssetList,
    ) -> CacheResult<Self> {
        let current = current.into();
        validate_cache_name(&current)?;
        Ok(Self {
            storage,
            current,
            assets,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Bound the parallelism of provisioning and retirement
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Name of the cache owned by this version
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn assets(&self) -> &AssetList {
        &self.assets
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Open the current cache and seed it with every asset.
    ///
    /// Never fails: an asset that cannot be fetched or stored is logged and
    /// recorded in the report. Gaps are filled later as requests succeed.
    pub async fn provision(&self, transport: &dyn Transport) -> ProvisionReport {
        let mut report = ProvisionReport {
            cache_name: self.current.clone(),
            ..Default::default()
        };

        if let Err(e) = self.storage.open(&self.current).await {
            warn!("Could not open cache {}: {}", self.current, e);
            report.failed = self
                .assets
                .iter()
                .map(|url| (url.clone(), e.to_string()))
                .collect();
            return report;
        }

        info!(
            "Seeding cache {} with {} asset(s)",
            self.current,
            self.assets.len()
        );

        let mut results: Vec<(usize, String, CacheResult<()>)> =
            stream::iter(self.assets.iter().enumerate().map(|(index, url)| async move {
                let result = self.seed_one(transport, url).await;
                (index, url.clone(), result)
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _, _)| *index);

        for (_, url, result) in results {
            match result {
                Ok(()) => report.seeded.push(url),
                Err(e) => {
                    warn!("Failed to seed {}: {}", url, e);
                    report.failed.push((url, e.to_string()));
                }
            }
        }

        info!(
            "Seeded {}/{} asset(s) into {}",
            report.seeded.len(),
            self.assets.len(),
            self.current
        );
        report
    }

    async fn seed_one(&self, transport: &dyn Transport, url: &str) -> CacheResult<()> {
        let request = Request::get(url);
        let response = transport.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(CacheError::transport(
                url,
                format!("unexpected status {}", response.status),
            ));
        }
        self.write(&request.key(), &response).await
    }

    /// Delete every cache whose name differs from the current one.
    ///
    /// Individual deletion failures are logged and reported; only failing to
    /// enumerate caches at all is an error.
    pub async fn retire_stale(&self) -> CacheResult<RetireReport> {
        let stale: Vec<String> = self
            .storage
            .names()
            .await?
            .into_iter()
            .filter(|name| name != &self.current)
            .collect();

        let mut report = RetireReport {
            kept: self.current.clone(),
            ..Default::default()
        };

        if stale.is_empty() {
            debug!("No stale caches to retire");
            return Ok(report);
        }

        let results: Vec<(String, CacheResult<bool>)> =
            stream::iter(stale.into_iter().map(|name| async move {
                info!("Deleting old cache: {}", name);
                let result = self.storage.delete(&name).await;
                (name, result)
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (name, result) in results {
            match result {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    warn!("Failed to delete old cache {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report.deleted.sort();
        report.failed.sort();
        Ok(report)
    }

    /// Find the stored entry for a request. Never mutates.
    pub async fn lookup(&self, key: &RequestKey) -> CacheResult<Option<CacheEntry>> {
        self.storage.get(&self.current, key).await
    }

    /// Store a response under the current cache, replacing any older entry.
    ///
    /// The cache must already exist. A write that lands after the cache was
    /// retired fails with `CacheNotFound` instead of recreating it.
    pub async fn write(&self, key: &RequestKey, response: &Response) -> CacheResult<()> {
        if !response.is_cacheable() {
            return Err(CacheError::Internal(format!(
                "refusing to cache {} with status {}",
                key, response.status
            )));
        }
        self.storage.put(&self.current, key, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FaultyStorage;
    use crate::store::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves fixed statuses per URL; unknown URLs fail like a dropped connection
    struct FixedTransport(HashMap<String, u16>);

    #[async_trait]
    impl Transport for FixedTransport {
        async fn fetch(&self, request: &Request) -> CacheResult<Response> {
            match self.0.get(&request.url) {
                Some(status) => Ok(Response::new(*status, format!("body of {}", request.url))),
                None => Err(CacheError::transport(&request.url, "connection refused")),
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn transport(entries: &[(&str, u16)]) -> FixedTransport {
        FixedTransport(entries.iter().map(|(u, s)| (u.to_string(), *s)).collect())
    }

    fn manager(storage: Arc<dyn CacheStorage>, name: &str, assets: &[&str]) -> CacheStoreManager {
        let assets = AssetList::new(assets.iter().map(|s| s.to_string()).collect());
        CacheStoreManager::new(storage, name, assets).unwrap()
    }

    #[tokio::test]
    async fn provision_seeds_all_assets() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let mgr = manager(storage.clone(), "v1", &["/", "/index.html"]);

        let report = mgr
            .provision(&transport(&[("/", 200), ("/index.html", 200)]))
            .await;

        assert!(report.is_complete());
        assert_eq!(report.seeded, vec!["/", "/index.html"]);
        assert_eq!(storage.keys("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn provision_tolerates_partial_failure() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let mgr = manager(
            storage.clone(),
            "v1",
            &["/", "/manifest.json", "/icons/missing.png"],
        );

        let report = mgr
            .provision(&transport(&[("/", 200), ("/icons/missing.png", 404)]))
            .await;

        assert_eq!(report.seeded, vec!["/"]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, "/manifest.json");
        assert!(report.failed[1].1.contains("404"));
        assert_eq!(storage.keys("v1").await.unwrap(), vec![Request::get("/").key()]);
    }

    #[tokio::test]
    async fn provision_twice_is_idempotent() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let mgr = manager(storage.clone(), "v1", &["/", "/index.html"]);
        let net = transport(&[("/", 200), ("/index.html", 200)]);

        mgr.provision(&net).await;
        let first = storage.keys("v1").await.unwrap();
        let report = mgr.provision(&net).await;
        let second = storage.keys("v1").await.unwrap();

        assert!(report.is_complete());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn provision_with_empty_asset_list_creates_cache() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let mgr = manager(storage.clone(), "v1", &[]);

        let report = mgr.provision(&transport(&[])).await;

        assert!(report.is_complete());
        assert!(storage.has("v1").await.unwrap());
    }

    #[tokio::test]
    async fn retire_stale_keeps_only_current() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        for name in ["v0", "v1", "v2", "other-app"] {
            storage.open(name).await.unwrap();
        }
        let mgr = manager(storage.clone(), "v2", &[]).with_concurrency(2);

        let report = mgr.retire_stale().await.unwrap();

        assert_eq!(report.kept, "v2");
        assert_eq!(report.deleted, vec!["other-app", "v0", "v1"]);
        assert_eq!(report.deleted_count(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(storage.names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn retire_stale_with_nothing_to_do() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let mgr = manager(storage, "v1", &[]);

        let report = mgr.retire_stale().await.unwrap();
        assert_eq!(report.deleted_count(), 0);
    }

    #[tokio::test]
    async fn lookup_and_write() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        storage.open("v1").await.unwrap();
        let mgr = manager(storage, "v1", &[]);
        let key = Request::get("/app.js").key();

        assert!(mgr.lookup(&key).await.unwrap().is_none());
        mgr.write(&key, &Response::new(200, "js")).await.unwrap();
        let entry = mgr.lookup(&key).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"js");
    }

    #[tokio::test]
    async fn write_refuses_non_200() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        storage.open("v1").await.unwrap();
        let mgr = manager(storage, "v1", &[]);
        let key = Request::get("/gone").key();

        assert!(mgr.write(&key, &Response::new(404, "")).await.is_err());
        assert!(mgr.lookup(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_to_retired_cache_does_not_resurrect_it() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let old = manager(storage.clone(), "v1", &[]);
        let new = manager(storage.clone(), "v2", &[]);
        old.provision(&transport(&[])).await;
        new.provision(&transport(&[])).await;
        new.retire_stale().await.unwrap();

        let err = old
            .write(&Request::get("/late.js").key(), &Response::new(200, "late"))
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::CacheNotFound(_)));
        assert_eq!(storage.names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn retire_stale_reports_failed_deletions() {
        let storage = Arc::new(FaultyStorage::new().failing_delete_of("v1"));
        for name in ["v0", "v1", "v2", "v3"] {
            storage.open(name).await.unwrap();
        }
        let mgr = manager(storage.clone(), "v3", &[]);

        let report = mgr.retire_stale().await.unwrap();

        assert_eq!(report.deleted, vec!["v0", "v2"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "v1");
        assert!(report.failed[0].1.contains("deleting cache"));
        assert_eq!(storage.names().await.unwrap(), vec!["v1", "v3"]);
    }

    #[tokio::test]
    async fn retire_stale_fails_when_caches_cannot_be_listed() {
        let storage = Arc::new(FaultyStorage::new().failing_names());
        let mgr = manager(storage, "v1", &[]);

        assert!(mgr.retire_stale().await.is_err());
    }

    #[test]
    fn rejects_invalid_current_name() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        assert!(CacheStoreManager::new(storage, "", AssetList::default()).is_err());
    }
}
