//! Storage double with injectable faults, shared by unit tests

use crate::error::{CacheError, CacheResult};
use crate::request::{RequestKey, Response};
use crate::store::{CacheEntry, CacheStorage, MemoryStorage};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::sync::Notify;

/// In-memory storage that fails or stalls on demand
#[derive(Default)]
pub(crate) struct FaultyStorage {
    inner: MemoryStorage,
    /// Cache whose deletion fails
    fail_delete: Option<String>,
    /// Listing caches fails
    fail_names: bool,
    /// Every put fails
    fail_puts: bool,
    /// Puts wait for this before storing
    put_gate: Option<Arc<Notify>>,
}

impl FaultyStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_delete_of(mut self, name: &str) -> Self {
        self.fail_delete = Some(name.to_string());
        self
    }

    pub(crate) fn failing_names(mut self) -> Self {
        self.fail_names = true;
        self
    }

    pub(crate) fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub(crate) fn gated_puts(mut self, gate: Arc<Notify>) -> Self {
        self.put_gate = Some(gate);
        self
    }
}

fn denied(context: &str) -> CacheError {
    CacheError::io(context, io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        self.inner.open(name).await
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        if self.fail_names {
            return Err(denied("listing caches"));
        }
        self.inner.names().await
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        if self.fail_delete.as_deref() == Some(name) {
            return Err(denied("deleting cache"));
        }
        self.inner.delete(name).await
    }

    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<CacheEntry>> {
        self.inner.get(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> CacheResult<()> {
        if let Some(gate) = &self.put_gate {
            gate.notified().await;
        }
        if self.fail_puts {
            return Err(denied("writing entry"));
        }
        self.inner.put(name, key, response).await
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        self.inner.keys(name).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
