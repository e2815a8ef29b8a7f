use crate::error::{CacheError, CacheResult};
use crate::request::{Request, Response};
use crate::transport::Transport;
use async_trait::async_trait;

/// Transport with no network: every fetch fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        Err(CacheError::transport(&request.url, "network unavailable"))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
