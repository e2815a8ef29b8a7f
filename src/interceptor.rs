//! Per-request interception policy
//!
//! Reads are served network-first. A 200 from the network is returned at
//! once and copied into the cache by a detached task; a network failure falls
//! back to the cache; a miss on both sides is an error. Writes and requests
//! to auth providers are never intercepted.

use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::request::{Method, Request, RequestKey, Response};
use crate::store::CacheStoreManager;
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// URL fragments whose requests must always reach the network directly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    patterns: Vec<String>,
}

impl ExclusionRules {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| -> String { p.into() })
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.intercept.exclude.iter().cloned())
    }

    /// The first pattern contained in the URL, if any
    pub fn matching(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| url.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Why a request was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bypass {
    /// Only reads are cached
    NonReadMethod(Method),
    /// URL belongs to an excluded (auth) domain
    Excluded { pattern: String },
}

impl fmt::Display for Bypass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonReadMethod(method) => write!(f, "{} requests are not cached", method),
            Self::Excluded { pattern } => write!(f, "excluded by pattern '{}'", pattern),
        }
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live network, through the interceptor
    Network,
    /// Cache fallback after a network failure
    Cache,
    /// Live network, not intercepted
    Passthrough,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Cache => write!(f, "cache"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Handle to a detached cache write.
///
/// Dropping it leaves the write running. Its failures are logged by the task
/// itself and never reach the caller.
#[derive(Debug)]
pub struct WriteBack(JoinHandle<()>);

impl WriteBack {
    /// Whether the write has already finished
    pub fn is_settled(&self) -> bool {
        self.0.is_finished()
    }

    /// Wait until the write has finished, successfully or not
    pub async fn settled(self) {
        if let Err(e) = self.0.await {
            warn!("Cache write task aborted: {}", e);
        }
    }
}

/// A response handed back to the caller
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub write_back: Option<WriteBack>,
}

/// What the interceptor decided for a request
#[derive(Debug)]
pub enum Disposition {
    /// Not intercepted; the caller sends the request itself
    Bypass(Bypass),
    /// Answered by the interceptor
    Respond(Served),
}

/// Network-first interceptor sharing one cache store manager
pub struct RequestInterceptor {
    manager: Arc<CacheStoreManager>,
    transport: Arc<dyn Transport>,
    exclusions: ExclusionRules,
}

impl RequestInterceptor {
    pub fn new(
        manager: Arc<CacheStoreManager>,
        transport: Arc<dyn Transport>,
        exclusions: ExclusionRules,
    ) -> Self {
        Self {
            manager,
            transport,
            exclusions,
        }
    }

    pub fn exclusions(&self) -> &ExclusionRules {
        &self.exclusions
    }

    /// Reason to leave a request alone, if there is one
    pub fn bypass_reason(&self, request: &Request) -> Option<Bypass> {
        if !request.method.is_read() {
            return Some(Bypass::NonReadMethod(request.method.clone()));
        }
        self.exclusions
            .matching(&request.url)
            .map(|pattern| Bypass::Excluded {
                pattern: pattern.to_string(),
            })
    }

    /// Decide and, for eligible requests, serve.
    ///
    /// Fails only with `OfflineNotCached`, when the network is unreachable and
    /// nothing is stored for the request.
    pub async fn handle(&self, request: &Request) -> CacheResult<Disposition> {
        if let Some(bypass) = self.bypass_reason(request) {
            debug!("Not intercepting {}: {}", request.url, bypass);
            return Ok(Disposition::Bypass(bypass));
        }

        let key = request.key();

        match self.transport.fetch(request).await {
            Ok(response) => {
                let write_back = if response.is_cacheable() {
                    Some(self.spawn_write_back(key, response.clone()))
                } else {
                    debug!(
                        "Not caching {} (status {})",
                        request.url, response.status
                    );
                    None
                };
                Ok(Disposition::Respond(Served {
                    response,
                    source: ResponseSource::Network,
                    write_back,
                }))
            }
            Err(err) => {
                debug!("Network failed for {}, trying cache: {}", request.url, err);
                match self.manager.lookup(&key).await {
                    Ok(Some(entry)) => Ok(Disposition::Respond(Served {
                        response: entry.response,
                        source: ResponseSource::Cache,
                        write_back: None,
                    })),
                    Ok(None) => {
                        info!("Resource not in cache: {}", request.url);
                        Err(CacheError::OfflineNotCached {
                            url: request.url.clone(),
                        })
                    }
                    Err(e) => {
                        warn!("Cache lookup failed for {}: {}", request.url, e);
                        Err(CacheError::OfflineNotCached {
                            url: request.url.clone(),
                        })
                    }
                }
            }
        }
    }

    fn spawn_write_back(&self, key: RequestKey, response: Response) -> WriteBack {
        let manager = Arc::clone(&self.manager);
        WriteBack(tokio::spawn(async move {
            match manager.write(&key, &response).await {
                Ok(()) => debug!("Cached {}", key),
                Err(e) => warn!("Failed to cache {}: {}", key, e),
            }
        }))
    }
}
