//! Configuration schema for swcache
//!
//! Configuration is stored at `~/.config/swcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Deployed worker version and location
    pub worker: WorkerConfig,

    /// Pre-seeded and runtime-cached resources
    pub assets: AssetsConfig,

    /// Interception rules
    pub intercept: InterceptConfig,

    /// Network transport settings
    pub network: NetworkConfig,

    /// Cache storage settings
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Worker version and deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name of the cache owned by this version. Bump it on every deployment.
    pub cache_name: String,

    /// Path the worker script is served from; the base path is derived from it
    pub script_path: String,

    /// Origin that relative asset paths are fetched from (e.g. https://app.example.com)
    pub origin: Option<String>,

    /// Take over from the previous version as soon as install finishes
    pub skip_waiting: bool,

    /// Control existing clients immediately after activation
    pub claim_clients: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "app-cache-v1".to_string(),
            script_path: "/service-worker.js".to_string(),
            origin: None,
            skip_waiting: true,
            claim_clients: true,
        }
    }
}

/// Asset lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Local resources seeded at install time, relative to the base path
    pub local: Vec<String>,

    /// Third-party resources. Never pre-seeded: cross-origin responses can
    /// fail an install, so these are only cached when first fetched.
    pub runtime: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            local: vec![
                String::new(),
                "index.html".to_string(),
                "manifest.json".to_string(),
                "icons/icon-192x192.png".to_string(),
                "icons/icon-512x512.png".to_string(),
            ],
            runtime: vec![
                "https://cdn.tailwindcss.com".to_string(),
                "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap"
                    .to_string(),
            ],
        }
    }
}

/// Request interception settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// URL fragments that always go straight to the network (auth providers)
    pub exclude: Vec<String>,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "firebaseapp.com".to_string(),
                "googleapis.com/identitytoolkit".to_string(),
                "securetoken.googleapis.com".to_string(),
            ],
        }
    }
}

/// Network transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Overall request timeout in seconds (0 = transport default)
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("swcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where cached responses are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory per cache under `storage.dir`
    #[default]
    Disk,
    /// Process memory only
    Memory,
}

/// Cache storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend
    pub backend: StorageBackend,

    /// Storage root (defaults to the state directory)
    pub dir: Option<PathBuf>,

    /// Maximum concurrent fetches or deletes during install and activate
    pub concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            dir: None,
            concurrency: 8,
        }
    }
}
