//! Network transport abstraction
//!
//! The interceptor and the cache store only see a capability that turns a
//! request into a response or a failure. How long a failure takes to show up
//! is entirely up to the transport's own timeout.

mod http;
mod offline;

pub use http::HttpTransport;
pub use offline::OfflineTransport;

use crate::config::Config;
use crate::error::CacheResult;
use crate::request::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches a request over the network
///
/// A transport returns `Ok` for every response it receives, whatever its
/// status. `Err` means no response at all (offline, DNS, TLS, timeout).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> CacheResult<Response>;

    /// Human-readable transport name for display
    fn name(&self) -> &'static str;
}

/// Create the transport for a run: live HTTP, or a transport that behaves as
/// if the machine were offline
pub fn create_transport(config: &Config, offline: bool) -> Arc<dyn Transport> {
    if offline {
        Arc::new(OfflineTransport)
    } else {
        Arc::new(HttpTransport::new(&config.network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_transport_picks_backend() {
        let config = Config::default();
        assert_eq!(create_transport(&config, true).name(), "offline");
        assert_eq!(create_transport(&config, false).name(), "http");
    }
}
