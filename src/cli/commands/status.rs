//! Status command - show the resolved deployment and stored caches

use crate::assets::{AssetList, Scope};
use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::CacheResult;
use crate::store::create_storage;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");
static DOT: Emoji<'_, '_> = Emoji("• ", "- ");

/// Execute the status command
pub async fn execute(config: &Config) -> CacheResult<()> {
    let scope = Scope::from_config(config);

    println!("{}", style("swcache status").bold().cyan());
    println!();

    println!("{}", style("Deployment:").bold());
    println!("  Script:     {}", config.worker.script_path);
    println!("  Base path:  {}", scope.base_path);
    println!(
        "  Origin:     {}",
        scope.origin.as_deref().unwrap_or("(none, paths are used as-is)")
    );
    println!("  Version:    {}", config.worker.cache_name);
    println!(
        "  Hand-over:  skip_waiting={} claim_clients={}",
        config.worker.skip_waiting, config.worker.claim_clients
    );

    println!();
    println!("{}", style("Seeded at install:").bold());
    let assets = AssetList::resolve(&scope, &config.assets.local);
    if assets.is_empty() {
        println!("  (none)");
    }
    for url in assets.iter() {
        println!("  {}{}", DOT, url);
    }

    println!();
    println!("{}", style("Cached on first use:").bold());
    if config.assets.runtime.is_empty() {
        println!("  (none)");
    }
    for url in &config.assets.runtime {
        println!("  {}{}", DOT, url);
    }

    println!();
    println!("{}", style("Never intercepted:").bold());
    for pattern in &config.intercept.exclude {
        println!("  {}*{}*", DOT, pattern);
    }

    println!();
    println!("{}", style("Storage:").bold());
    match config.storage.backend {
        StorageBackend::Disk => println!(
            "  Backend:    disk ({})",
            ConfigManager::storage_dir(config).display()
        ),
        StorageBackend::Memory => println!("  Backend:    memory"),
    }

    let storage = create_storage(config);
    let names = storage.names().await?;
    let current = &config.worker.cache_name;

    if names.iter().any(|n| n == current) {
        let entries = storage.keys(current).await?.len();
        println!("  {}{} installed ({} entries)", CHECK, current, entries);
    } else {
        println!(
            "  {}{} not installed - run: swcache install",
            WARN,
            style(current).yellow()
        );
    }
    for name in names.iter().filter(|n| *n != current) {
        println!("  {}{} stale, removed on next install", WARN, name);
    }

    Ok(())
}
