//! Hand-over between worker incarnations
//!
//! A registration has at most one active worker and one waiting worker. A
//! newer worker may install while the old one is still serving, but it only
//! activates after the old one has been marked redundant. Fetches wait while
//! a hand-over is in progress, so no request is ever served by two versions.

use crate::error::CacheResult;
use crate::interceptor::Served;
use crate::lifecycle::worker::{passthrough, Worker};
use crate::request::Request;
use crate::store::{ProvisionReport, RetireReport};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Result of registering a new worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Installed and took control
    Activated {
        provision: ProvisionReport,
        retire: RetireReport,
    },
    /// Installed, waiting for the active worker to go away
    Waiting { provision: ProvisionReport },
}

/// Controller slot shared by all worker incarnations
pub struct Registration {
    transport: Arc<dyn Transport>,
    active: Mutex<Option<Arc<Worker>>>,
    waiting: Mutex<Option<Arc<Worker>>>,
}

impl Registration {
    /// `transport` serves requests while no worker is active
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            active: Mutex::new(None),
            waiting: Mutex::new(None),
        }
    }

    /// Install a new worker and, when allowed, make it the controller
    pub async fn register(&self, worker: Arc<Worker>) -> CacheResult<RegisterOutcome> {
        let provision = worker.install().await?;

        let has_active = self.active.lock().await.is_some();
        if worker.options().skip_waiting || !has_active {
            let retire = self.promote(worker).await?;
            return Ok(RegisterOutcome::Activated { provision, retire });
        }

        info!("Worker {} installed, waiting", worker.cache_name());
        if let Some(superseded) = self.waiting.lock().await.replace(worker) {
            superseded.mark_redundant();
        }
        Ok(RegisterOutcome::Waiting { provision })
    }

    /// Promote the waiting worker, if any
    pub async fn skip_waiting(&self) -> CacheResult<Option<RetireReport>> {
        let waiting = self.waiting.lock().await.take();
        match waiting {
            Some(worker) => Ok(Some(self.promote(worker).await?)),
            None => Ok(None),
        }
    }

    async fn promote(&self, worker: Arc<Worker>) -> CacheResult<RetireReport> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            info!(
                "Worker {} relinquishing control to {}",
                previous.cache_name(),
                worker.cache_name()
            );
            previous.mark_redundant();
        }

        // An older version still waiting must never take over later
        if let Some(stale) = self.waiting.lock().await.take() {
            if !Arc::ptr_eq(&stale, &worker) {
                info!("Worker {} superseded while waiting", stale.cache_name());
                stale.mark_redundant();
            }
        }

        let report = worker.activate().await?;
        *active = Some(worker);
        Ok(report)
    }

    /// The worker currently in control
    pub async fn controller(&self) -> Option<Arc<Worker>> {
        self.active.lock().await.clone()
    }

    /// The installed worker waiting to take control
    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.waiting.lock().await.clone()
    }

    /// Route a request to the controller, or to the network when there is none
    pub async fn fetch(&self, request: &Request) -> CacheResult<Served> {
        match self.controller().await {
            Some(worker) => worker.handle_fetch(request).await,
            None => passthrough(self.transport.as_ref(), request).await,
        }
    }
}
