//! Integration tests for swcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn swcache() -> Command {
        cargo_bin_cmd!("swcache")
    }

    /// Config pointing disk storage into the temp dir
    fn write_config(dir: &Path) -> std::path::PathBuf {
        let config_path = dir.join("config.toml");
        let storage_dir = dir.join("caches");
        std::fs::write(
            &config_path,
            format!(
                "[worker]\ncache_name = \"app-cache-v1\"\nscript_path = \"/app/sw.js\"\n\n[storage]\ndir = '{}'\n",
                storage_dir.display()
            ),
        )
        .unwrap();
        config_path
    }

    fn with_config(config: &Path) -> Command {
        let mut cmd = swcache();
        cmd.env("SWCACHE_CONFIG", config).env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        swcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Offline asset cache manager"));
    }

    #[test]
    fn version_displays() {
        swcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("securetoken.googleapis.com"));
    }

    #[test]
    fn config_init_creates_file() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("fresh").join("config.toml");
        with_config(&config)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(config.exists());
    }

    #[test]
    fn caches_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["caches", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No caches found"));
    }

    #[test]
    fn status_reports_base_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("/app/"))
            .stdout(predicate::str::contains("not installed"));
    }

    #[test]
    fn offline_install_still_creates_cache() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());

        with_config(&config)
            .args(["install", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("0 of 5 asset(s) seeded"))
            .stdout(predicate::str::contains("app-cache-v1 is active"));

        with_config(&config)
            .args(["caches", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("app-cache-v1"));
    }

    #[test]
    fn install_retires_stale_cache_dirs() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        std::fs::create_dir_all(temp.path().join("caches").join("app-cache-v0")).unwrap();

        with_config(&config)
            .args(["install", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("app-cache-v0"));

        assert!(!temp.path().join("caches").join("app-cache-v0").exists());
        assert!(temp.path().join("caches").join("app-cache-v1").exists());
    }

    #[test]
    fn fetch_before_install_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["fetch", "index.html", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not installed"))
            .stderr(predicate::str::contains("swcache install"));
    }

    #[test]
    fn offline_fetch_of_uncached_resource_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["install", "--offline"])
            .assert()
            .success();

        with_config(&config)
            .args(["fetch", "unseen.js", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "Offline and resource not cached: /app/unseen.js",
            ));
    }

    #[test]
    fn delete_missing_cache_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path());
        with_config(&config)
            .args(["caches", "delete", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache not found"));
    }
}

mod scenario_tests {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use swcache::assets::{AssetList, Scope};
    use swcache::interceptor::{ExclusionRules, ResponseSource};
    use swcache::lifecycle::{RegisterOutcome, Registration, Worker, WorkerOptions, WorkerState};
    use swcache::request::{Request, Response};
    use swcache::store::{CacheStorage, CacheStoreManager, DiskStorage, MemoryStorage};
    use swcache::transport::Transport;
    use swcache::{CacheError, CacheResult};
    use tempfile::TempDir;

    /// A network that can be switched off
    struct SwitchableNetwork {
        online: AtomicBool,
        pages: HashMap<String, Response>,
    }

    impl SwitchableNetwork {
        fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
            Arc::new(Self {
                online: AtomicBool::new(true),
                pages: pages
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), Response::new(*status, *body)))
                    .collect(),
            })
        }

        fn go_offline(&self) {
            self.online.store(false, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for SwitchableNetwork {
        async fn fetch(&self, request: &Request) -> CacheResult<Response> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(CacheError::transport(&request.url, "offline"));
            }
            self.pages
                .get(&request.url)
                .cloned()
                .ok_or_else(|| CacheError::transport(&request.url, "connection reset"))
        }

        fn name(&self) -> &'static str {
            "switchable"
        }
    }

    fn worker(
        storage: Arc<dyn CacheStorage>,
        network: Arc<SwitchableNetwork>,
        name: &str,
        assets: &[&str],
    ) -> Arc<Worker> {
        let scope = Scope::new(None, "/sw.js");
        let entries: Vec<String> = assets.iter().map(|s| s.to_string()).collect();
        let manager =
            CacheStoreManager::new(storage, name, AssetList::resolve(&scope, &entries)).unwrap();
        Arc::new(Worker::new(
            Arc::new(manager),
            network,
            ExclusionRules::new(["firebaseapp.com", "securetoken.googleapis.com"]),
            WorkerOptions::default(),
        ))
    }

    #[tokio::test]
    async fn seed_then_serve_offline() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let network = SwitchableNetwork::new(&[
            ("/", 200, "<html>root</html>"),
            ("/index.html", 200, "<html>index</html>"),
        ]);
        let registration = Registration::new(network.clone());

        let outcome = registration
            .register(worker(storage.clone(), network.clone(), "v1", &["", "index.html"]))
            .await
            .unwrap();
        match outcome {
            RegisterOutcome::Activated { provision, .. } => assert_eq!(provision.seeded.len(), 2),
            other => panic!("expected activation, got {other:?}"),
        }
        assert_eq!(storage.keys("v1").await.unwrap().len(), 2);

        network.go_offline();

        let served = registration.fetch(&Request::get("/index.html")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body, b"<html>index</html>");

        let err = registration
            .fetch(&Request::get("/unseen.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::OfflineNotCached { .. }));
        assert_eq!(err.to_string(), "Offline and resource not cached: /unseen.js");
    }

    #[tokio::test]
    async fn opportunistic_caching_fills_gaps() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let network = SwitchableNetwork::new(&[
            ("/", 200, "root"),
            ("https://cdn.test/lib.js", 200, "lib"),
        ]);
        let registration = Registration::new(network.clone());
        registration
            .register(worker(storage.clone(), network.clone(), "v1", &[""]))
            .await
            .unwrap();

        let served = registration
            .fetch(&Request::get("https://cdn.test/lib.js"))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        served.write_back.unwrap().settled().await;

        network.go_offline();
        let served = registration
            .fetch(&Request::get("https://cdn.test/lib.js"))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body, b"lib");
    }

    #[tokio::test]
    async fn auth_requests_are_never_cached() {
        let token_url = "https://securetoken.googleapis.com/v1/token";
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let network = SwitchableNetwork::new(&[(token_url, 200, "token")]);
        let registration = Registration::new(network.clone());
        registration
            .register(worker(storage.clone(), network.clone(), "v1", &[]))
            .await
            .unwrap();

        for _ in 0..3 {
            let served = registration.fetch(&Request::get(token_url)).await.unwrap();
            assert_eq!(served.source, ResponseSource::Passthrough);
            assert!(served.write_back.is_none());
        }
        assert!(storage.keys("v1").await.unwrap().is_empty());

        network.go_offline();
        let err = registration.fetch(&Request::get(token_url)).await.unwrap_err();
        assert!(matches!(err, CacheError::Transport { .. }));
    }

    #[tokio::test]
    async fn new_version_replaces_old_caches_on_disk() {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn CacheStorage> = Arc::new(DiskStorage::new(temp.path()));
        let network = SwitchableNetwork::new(&[("/", 200, "v1 root")]);
        let registration = Registration::new(network.clone());

        for old in ["v-2023", "v-2024"] {
            storage.open(old).await.unwrap();
        }
        let v1 = worker(storage.clone(), network.clone(), "v1", &[""]);
        registration.register(v1.clone()).await.unwrap();
        let v2 = worker(storage.clone(), network.clone(), "v2", &[""]);
        let outcome = registration.register(v2.clone()).await.unwrap();

        match outcome {
            RegisterOutcome::Activated { retire, .. } => {
                assert!(retire.deleted.contains(&"v1".to_string()));
                assert!(retire.failed.is_empty());
            }
            other => panic!("expected activation, got {other:?}"),
        }
        assert_eq!(v1.state(), WorkerState::Redundant);
        assert_eq!(v2.state(), WorkerState::Active);
        assert_eq!(storage.names().await.unwrap(), vec!["v2"]);
    }
}
