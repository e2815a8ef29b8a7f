//! Fetch command - run one request through the cache policy

use crate::assets::Scope;
use crate::cli::args::FetchArgs;
use crate::config::{Config, StorageBackend};
use crate::error::{CacheError, CacheResult};
use crate::interceptor::ResponseSource;
use crate::lifecycle::Worker;
use crate::request::{Method, Request};
use crate::store::create_storage;
use crate::transport::create_transport;
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> CacheResult<()> {
    let storage = create_storage(config);
    let transport = create_transport(config, args.offline);
    let worker = Worker::from_config(config, storage, transport)?;

    match config.storage.backend {
        // Nothing outlives the process, so seed now
        StorageBackend::Memory => {
            worker.install().await?;
            worker.activate().await?;
        }
        StorageBackend::Disk => worker.resume().await?,
    }

    let url = Scope::from_config(config).resolve(&args.url);
    let request = Request::new(Method::from(args.method.as_str()), url);
    debug!("Fetching {} {}", request.method, request.url);

    let served = worker.handle_fetch(&request).await?;

    let source = match served.source {
        ResponseSource::Network => style("network").green(),
        ResponseSource::Cache => style("cache").yellow(),
        ResponseSource::Passthrough => style("passthrough").dim(),
    };
    eprintln!(
        "{} {} ({} bytes, from {})",
        style(served.response.status).bold(),
        request.url,
        served.response.body.len(),
        source
    );

    // The process is about to exit and would abandon the write
    if let Some(write_back) = served.write_back {
        write_back.settled().await;
    }

    if args.head {
        return Ok(());
    }

    match args.output {
        Some(path) => tokio::fs::write(&path, &served.response.body)
            .await
            .map_err(|e| CacheError::io(format!("writing {}", path.display()), e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&served.response.body)
                .and_then(|()| stdout.flush())
                .map_err(|e| CacheError::io("writing response body", e))
        }
    }
}
