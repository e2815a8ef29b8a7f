//! Error types for swcache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swcache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in swcache
#[derive(Error, Debug)]
pub enum CacheError {
    // Request errors
    #[error("Offline and resource not cached: {url}")]
    OfflineNotCached { url: String },

    #[error("Network request failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    // Store errors
    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("Invalid cache name '{name}': {reason}")]
    InvalidCacheName { name: String, reason: String },

    #[error("Corrupt cache entry {path}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },

    // Lifecycle errors
    #[error("Cache {0} is not installed")]
    NotInstalled(String),

    #[error("Worker {version} cannot {action} while {state}")]
    InvalidTransition {
        version: String,
        action: &'static str,
        state: String,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error for a URL
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether the network may succeed if the request is tried again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OfflineNotCached { .. } | Self::Transport { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::OfflineNotCached { .. } => {
                Some("Reconnect and fetch the resource once so it can be served offline")
            }
            Self::CacheNotFound(_) => Some("Run: swcache caches list"),
            Self::NotInstalled(_) => Some("Run: swcache install"),
            Self::ConfigInvalid { .. } => Some("Run: swcache config init --force"),
            _ => None,
        }
    }
}
