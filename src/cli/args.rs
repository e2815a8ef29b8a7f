//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// swcache - Offline asset cache manager
///
/// Seeds a versioned response cache, retires caches from older versions and
/// serves requests network-first with cache fallback.
#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SWCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install and activate the configured cache version
    Install(InstallArgs),

    /// Fetch a resource through the cache policy
    Fetch(FetchArgs),

    /// Inspect and manage stored caches
    Caches(CachesArgs),

    /// Show the resolved deployment and cache status
    Status,

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Seed with the network unavailable (every asset fails)
    #[arg(long)]
    pub offline: bool,

    /// Output format for the install report
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL, or path relative to the deployment base path
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Behave as if the network were unreachable
    #[arg(long)]
    pub offline: bool,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print status and source only
    #[arg(long)]
    pub head: bool,
}

/// Arguments for the caches command
#[derive(Parser, Debug)]
pub struct CachesArgs {
    /// Subcommand for caches
    #[command(subcommand)]
    pub action: CachesAction,
}

/// Caches subcommands
#[derive(Subcommand, Debug)]
pub enum CachesAction {
    /// List stored caches
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the entries of one cache
    Entries {
        /// Cache name (defaults to the current version)
        name: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete one cache
    Delete {
        /// Cache name
        name: String,
    },

    /// Delete every stored cache
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
