//! Install command - seed the current cache and retire older versions

use crate::cli::args::{InstallArgs, OutputFormat};
use crate::config::Config;
use crate::error::CacheResult;
use crate::lifecycle::{RegisterOutcome, Registration, Worker};
use crate::store::{create_storage, ProvisionReport, RetireReport};
use crate::transport::create_transport;
use console::{style, Emoji};
use std::sync::Arc;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static TRASH: Emoji<'_, '_> = Emoji("- ", "[DEL] ");

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> CacheResult<()> {
    let storage = create_storage(config);
    let transport = create_transport(config, args.offline);
    let worker = Arc::new(Worker::from_config(config, storage, Arc::clone(&transport))?);
    let registration = Registration::new(transport);

    let outcome = registration.register(worker).await?;

    match args.format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table | OutputFormat::Plain => print_outcome(&outcome),
    }

    Ok(())
}

fn print_outcome(outcome: &RegisterOutcome) {
    match outcome {
        RegisterOutcome::Activated { provision, retire } => {
            print_provision(provision);
            print_retire(retire);
            println!();
            println!(
                "{} {} is active",
                style("Installed:").bold().green(),
                provision.cache_name
            );
        }
        RegisterOutcome::Waiting { provision } => {
            print_provision(provision);
            println!();
            println!(
                "{} {} is waiting for the current version to go away",
                style("Installed:").bold().yellow(),
                provision.cache_name
            );
        }
    }
}

fn print_provision(report: &ProvisionReport) {
    println!(
        "{} {}",
        style("Seeding cache").bold().cyan(),
        style(&report.cache_name).bold()
    );
    for url in &report.seeded {
        println!("  {}{}", CHECK, url);
    }
    for (url, reason) in &report.failed {
        println!("  {}{} {}", CROSS, url, style(reason).dim());
    }
    println!(
        "  {} of {} asset(s) seeded",
        report.seeded.len(),
        report.seeded.len() + report.failed.len()
    );
}

fn print_retire(report: &RetireReport) {
    if report.deleted.is_empty() && report.failed.is_empty() {
        return;
    }
    println!();
    println!("{}", style("Retiring old caches").bold().cyan());
    for name in &report.deleted {
        println!("  {}{}", TRASH, name);
    }
    for (name, reason) in &report.failed {
        println!("  {}{} {}", CROSS, name, style(reason).dim());
    }
}

fn print_json(outcome: &RegisterOutcome) -> CacheResult<()> {
    let value = match outcome {
        RegisterOutcome::Activated { provision, retire } => serde_json::json!({
            "state": "active",
            "provision": provision,
            "retire": retire,
        }),
        RegisterOutcome::Waiting { provision } => serde_json::json!({
            "state": "waiting",
            "provision": provision,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
