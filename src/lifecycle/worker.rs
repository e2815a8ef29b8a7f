//! One deployed version of the cache worker

use crate::assets::{AssetList, Scope};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::interceptor::{Disposition, ExclusionRules, RequestInterceptor, ResponseSource, Served};
use crate::lifecycle::state::WorkerState;
use crate::request::Request;
use crate::store::{CacheStorage, CacheStoreManager, ProvisionReport, RetireReport};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a worker hands over between versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Take control as soon as install finishes instead of waiting for the
    /// previous version to go away
    pub skip_waiting: bool,
    /// Control existing clients right after activation
    pub claim_clients: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            skip_waiting: true,
            claim_clients: true,
        }
    }
}

/// A worker incarnation: one cache version plus the policy serving it
pub struct Worker {
    id: Uuid,
    manager: Arc<CacheStoreManager>,
    interceptor: RequestInterceptor,
    transport: Arc<dyn Transport>,
    options: WorkerOptions,
    state: watch::Sender<WorkerState>,
    clients_claimed: AtomicBool,
}

impl Worker {
    pub fn new(
        manager: Arc<CacheStoreManager>,
        transport: Arc<dyn Transport>,
        exclusions: ExclusionRules,
        options: WorkerOptions,
    ) -> Self {
        let interceptor =
            RequestInterceptor::new(Arc::clone(&manager), Arc::clone(&transport), exclusions);
        let (state, _) = watch::channel(WorkerState::Uninstalled);
        Self {
            id: Uuid::new_v4(),
            manager,
            interceptor,
            transport,
            options,
            state,
            clients_claimed: AtomicBool::new(false),
        }
    }

    /// Build a worker for the configured version
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
    ) -> CacheResult<Self> {
        let scope = Scope::from_config(config);
        let assets = AssetList::resolve(&scope, &config.assets.local);
        debug!(
            "Worker scope {} with {} local asset(s)",
            scope.base_path,
            assets.len()
        );

        let manager = CacheStoreManager::new(storage, config.worker.cache_name.clone(), assets)?
            .with_concurrency(config.storage.concurrency);
        let options = WorkerOptions {
            skip_waiting: config.worker.skip_waiting,
            claim_clients: config.worker.claim_clients,
        };

        Ok(Self::new(
            Arc::new(manager),
            transport,
            ExclusionRules::from_config(config),
            options,
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cache_name(&self) -> &str {
        self.manager.current()
    }

    pub fn options(&self) -> WorkerOptions {
        self.options
    }

    pub fn manager(&self) -> &Arc<CacheStoreManager> {
        &self.manager
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    fn transition(
        &self,
        allowed: &[WorkerState],
        to: WorkerState,
        action: &'static str,
    ) -> CacheResult<()> {
        let mut found = to;
        let changed = self.state.send_if_modified(|state| {
            found = *state;
            if allowed.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        });

        if changed {
            debug!("Worker {} {} -> {}", self.cache_name(), found, to);
            Ok(())
        } else {
            Err(CacheError::InvalidTransition {
                version: self.cache_name().to_string(),
                action,
                state: found.to_string(),
            })
        }
    }

    /// Handle the install signal: seed the cache.
    ///
    /// Seeding failures never fail the install; they are in the report.
    pub async fn install(&self) -> CacheResult<ProvisionReport> {
        self.transition(&[WorkerState::Uninstalled], WorkerState::Installing, "install")?;
        info!("Installing {}", self.cache_name());

        let report = self.manager.provision(self.transport.as_ref()).await;

        self.transition(&[WorkerState::Installing], WorkerState::Installed, "finish install")?;
        Ok(report)
    }

    /// Handle the activate signal: retire older caches, then take control.
    ///
    /// A failure to delete old caches is logged and never blocks activation.
    pub async fn activate(&self) -> CacheResult<RetireReport> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating, "activate")?;
        info!("Activating {}", self.cache_name());

        let report = match self.manager.retire_stale().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Could not list caches to retire: {}", e);
                RetireReport {
                    kept: self.cache_name().to_string(),
                    ..Default::default()
                }
            }
        };

        self.transition(&[WorkerState::Activating], WorkerState::Active, "finish activate")?;
        if self.options.claim_clients {
            self.clients_claimed.store(true, Ordering::SeqCst);
            debug!("Worker {} claimed clients", self.cache_name());
        }
        Ok(report)
    }

    /// Resume a version that was installed and activated by an earlier
    /// process, without re-seeding its cache
    pub async fn resume(&self) -> CacheResult<()> {
        if !self.manager.storage().has(self.cache_name()).await? {
            return Err(CacheError::NotInstalled(self.cache_name().to_string()));
        }
        self.transition(&[WorkerState::Uninstalled], WorkerState::Active, "resume")?;
        self.clients_claimed
            .store(self.options.claim_clients, Ordering::SeqCst);
        debug!("Resumed {}", self.cache_name());
        Ok(())
    }

    /// Give up control to a newer incarnation
    pub fn mark_redundant(&self) {
        let previous = self.state.send_replace(WorkerState::Redundant);
        self.clients_claimed.store(false, Ordering::SeqCst);
        if previous != WorkerState::Redundant {
            info!("Worker {} is now redundant", self.cache_name());
        }
    }

    /// Handle the fetch signal for one request.
    ///
    /// Until the worker is active, and for requests the interceptor leaves
    /// alone, the request goes straight to the network.
    pub async fn handle_fetch(&self, request: &Request) -> CacheResult<Served> {
        if !self.state().intercepts() {
            return passthrough(self.transport.as_ref(), request).await;
        }

        match self.interceptor.handle(request).await? {
            Disposition::Respond(served) => Ok(served),
            Disposition::Bypass(_) => passthrough(self.transport.as_ref(), request).await,
        }
    }
}

/// Send a request to the network without touching any cache
pub async fn passthrough(transport: &dyn Transport, request: &Request) -> CacheResult<Served> {
    let response = transport.fetch(request).await?;
    Ok(Served {
        response,
        source: ResponseSource::Passthrough,
        write_back: None,
    })
}
