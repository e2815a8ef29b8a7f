//! HTTP transport backed by ureq
//!
//! ureq is blocking, so each fetch runs on tokio's blocking pool. Redirects
//! are followed by the agent; the response keeps the originally requested URL
//! as its cache identity.

use crate::config::schema::NetworkConfig;
use crate::error::{CacheError, CacheResult};
use crate::request::{Method, Request, Response};
use crate::transport::Transport;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Live network transport
#[derive(Clone)]
pub struct HttpTransport {
    agent: Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig) -> Self {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }

    fn fetch_blocking(&self, request: &Request) -> CacheResult<Response> {
        let url = request.url.as_str();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CacheError::InvalidUrl(url.to_string()));
        }

        let result = match &request.method {
            Method::Get => self.with_headers(self.agent.get(url), request).call(),
            Method::Head => self.with_headers(self.agent.head(url), request).call(),
            Method::Delete => self.with_headers(self.agent.delete(url), request).call(),
            Method::Options => self.with_headers(self.agent.options(url), request).call(),
            Method::Post => self.with_headers(self.agent.post(url), request).send_empty(),
            Method::Put => self.with_headers(self.agent.put(url), request).send_empty(),
            Method::Patch => self.with_headers(self.agent.patch(url), request).send_empty(),
            Method::Other(m) => {
                return Err(CacheError::transport(
                    url,
                    format!("unsupported method {}", m),
                ))
            }
        };

        let mut resp = result.map_err(|e| CacheError::transport(url, e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp
            .body_mut()
            .read_to_vec()
            .map_err(|e| CacheError::transport(url, format!("reading body: {}", e)))?;

        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        Ok(Response {
            status,
            headers,
            body,
            url: url.to_string(),
        })
    }

    fn with_headers<B>(
        &self,
        builder: ureq::RequestBuilder<B>,
        request: &Request,
    ) -> ureq::RequestBuilder<B> {
        request
            .headers
            .iter()
            .fold(builder.header("user-agent", &self.user_agent), |b, (name, value)| {
                b.header(name, value)
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        let this = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || this.fetch_blocking(&request))
            .await
            .map_err(|e| CacheError::Internal(format!("fetch task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
