//! Caches command - inspect and manage stored caches

use crate::cli::args::{CachesAction, CachesArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::store::{create_storage, CacheStorage};
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the caches command
pub async fn execute(args: CachesArgs, config: &Config) -> CacheResult<()> {
    let storage = create_storage(config);
    debug!("Using {} storage", storage.backend_name());

    match args.action {
        CachesAction::List { format } => list_caches(&*storage, config, format).await,
        CachesAction::Entries { name, format } => {
            let name = name.unwrap_or_else(|| config.worker.cache_name.clone());
            list_entries(&*storage, &name, format).await
        }
        CachesAction::Delete { name } => delete_cache(&*storage, &name).await,
        CachesAction::Clear { yes } => clear_caches(&*storage, yes).await,
    }
}

#[derive(serde::Serialize)]
struct CacheSummary {
    name: String,
    entries: usize,
    current: bool,
}

async fn summarize(storage: &dyn CacheStorage, config: &Config) -> CacheResult<Vec<CacheSummary>> {
    let mut summaries = vec![];
    for name in storage.names().await? {
        let entries = storage.keys(&name).await?.len();
        summaries.push(CacheSummary {
            current: name == config.worker.cache_name,
            name,
            entries,
        });
    }
    Ok(summaries)
}

/// List all caches
async fn list_caches(
    storage: &dyn CacheStorage,
    config: &Config,
    format: OutputFormat,
) -> CacheResult<()> {
    let caches = summarize(storage, config).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&caches)?),
        OutputFormat::Plain => {
            for cache in &caches {
                println!("{}", cache.name);
            }
        }
        OutputFormat::Table => {
            if caches.is_empty() {
                println!("No caches found.");
                return Ok(());
            }

            println!("{:<40} {:<10} {:<10}", "CACHE", "ENTRIES", "STATE");
            println!("{}", "-".repeat(60));
            for cache in &caches {
                let state = if cache.current {
                    style("current").green().to_string()
                } else {
                    style("stale").yellow().to_string()
                };
                println!("{:<40} {:<10} {:<10}", cache.name, cache.entries, state);
            }
            println!();
            println!("Total: {} cache(s)", caches.len());
        }
    }

    Ok(())
}

/// List the entries of one cache
async fn list_entries(
    storage: &dyn CacheStorage,
    name: &str,
    format: OutputFormat,
) -> CacheResult<()> {
    if !storage.has(name).await? {
        return Err(CacheError::CacheNotFound(name.to_string()));
    }

    let keys = storage.keys(name).await?;

    match format {
        OutputFormat::Json => {
            let mut entries = vec![];
            for key in &keys {
                if let Some(entry) = storage.get(name, key).await? {
                    entries.push(serde_json::json!({
                        "key": entry.key,
                        "status": entry.response.status,
                        "bytes": entry.response.body.len(),
                        "stored_at": entry.stored_at.to_rfc3339(),
                    }));
                }
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Plain => {
            for key in &keys {
                println!("{}", key);
            }
        }
        OutputFormat::Table => {
            println!("{:<60} {:<10} {:<20}", "REQUEST", "BYTES", "STORED");
            println!("{}", "-".repeat(90));
            for key in &keys {
                match storage.get(name, key).await? {
                    Some(entry) => println!(
                        "{:<60} {:<10} {:<20}",
                        key.as_str(),
                        entry.response.body.len(),
                        entry.stored_at.format("%Y-%m-%d %H:%M")
                    ),
                    None => println!("{:<60} {:<10} {:<20}", key.as_str(), "-", "-"),
                }
            }
            println!();
            println!("Total: {} entr{}", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
        }
    }

    Ok(())
}

/// Delete a single cache
async fn delete_cache(storage: &dyn CacheStorage, name: &str) -> CacheResult<()> {
    if !storage.delete(name).await? {
        return Err(CacheError::CacheNotFound(name.to_string()));
    }
    println!("{} Deleted cache {}", style("✓").green(), name);
    Ok(())
}

/// Delete every cache
async fn clear_caches(storage: &dyn CacheStorage, yes: bool) -> CacheResult<()> {
    let names = storage.names().await?;

    if names.is_empty() {
        println!("No caches to clear.");
        return Ok(());
    }

    if !yes {
        print!("Delete {} cache(s)? [y/N] ", names.len());
        io::stdout()
            .flush()
            .map_err(|e| CacheError::io("flushing stdout", e))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| CacheError::io("reading confirmation", e))?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut deleted = 0;
    let mut failed = 0;
    for name in &names {
        match storage.delete(name).await {
            Ok(_) => deleted += 1,
            Err(e) => {
                eprintln!("{} {}: {}", style("Failed to delete").red(), name, e);
                failed += 1;
            }
        }
    }

    println!("Deleted {} cache(s)", deleted);
    if failed > 0 {
        return Err(CacheError::User(format!("{} cache(s) could not be deleted", failed)));
    }
    Ok(())
}
