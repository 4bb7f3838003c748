//! Creator-Atlas main entry point
//!
//! Command-line interface for the quota-aware channel directory harvester.

use anyhow::Context;
use clap::Parser;
use creator_atlas::api::{build_http_client, CallOutcome, DirectoryClient};
use creator_atlas::checkpoint::CheckpointStore;
use creator_atlas::config::load_config_with_hash;
use creator_atlas::crawler::harvest;
use creator_atlas::output::write_csv;
use creator_atlas::plan::CrawlPlanner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Creator-Atlas: a quota-aware channel directory harvester
///
/// Crawls a (category x city) search space against a quota-limited directory
/// API, rotating credentials and saving progress durably so interrupted runs
/// resume without re-spending quota.
#[derive(Parser, Debug)]
#[command(name = "creator-atlas")]
#[command(version = "1.0.0")]
#[command(about = "A quota-aware channel directory harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted run (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh run, ignoring any previous checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show the crawl plan without issuing any calls
    #[arg(long, conflicts_with_all = ["check_credentials", "export"])]
    dry_run: bool,

    /// Probe each configured credential with a minimal search call and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    check_credentials: bool,

    /// Rewrite the CSV export from the latest checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "check_credentials"])]
    export: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.check_credentials {
        handle_check_credentials(&config).await?;
    } else if cli.export {
        handle_export(&config)?;
    } else {
        handle_harvest(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("creator_atlas=info,warn"),
            1 => EnvFilter::new("creator_atlas=debug,info"),
            2 => EnvFilter::new("creator_atlas=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: validates config and shows what would be crawled
fn handle_dry_run(config: &creator_atlas::Config) {
    let planner = CrawlPlanner::new(config);

    println!("=== Creator-Atlas Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Target records: {}", config.harvest.target_count);
    println!(
        "  Max results per search: {}",
        config.harvest.max_results_per_search
    );
    println!("  Minimum subscribers: {}", config.harvest.min_subscribers);
    println!("  Workers: {}", config.harvest.workers);
    println!(
        "  Checkpoint every: {} records",
        config.harvest.checkpoint_interval
    );

    println!("\nQuota:");
    println!(
        "  Budget per credential: {} units / {} h window",
        config.quota.daily_budget, config.quota.window_hours
    );
    println!(
        "  Costs: search {} units/page, detail {} unit(s)",
        config.quota.search_cost, config.quota.detail_cost
    );
    println!(
        "  Total budget this window: {} units across {} credentials",
        config.quota.daily_budget * config.credential.len() as u64,
        config.credential.len()
    );

    println!("\nSearch space:");
    println!("  Categories: {}", config.category.len());
    println!("  Cities: {}", config.city.len());
    println!("  Tasks: {}", planner.total());

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would issue at least {} search calls ({} units minimum)",
        planner.total(),
        planner.total() as u64 * config.quota.search_cost
    );
}

/// Handles --check-credentials: probes each credential with a one-result
/// search, which bills one search-cost unit against that credential
async fn handle_check_credentials(config: &creator_atlas::Config) -> anyhow::Result<()> {
    let http = build_http_client(config.api.timeout_secs)?;
    let client = DirectoryClient::new(http, &config.api.base_url);

    println!("Probing {} credentials...\n", config.credential.len());

    let mut usable = 0;
    for entry in &config.credential {
        let outcome = client
            .search_page(&entry.token, "probe", 1, None, None)
            .await;

        let status = match outcome {
            CallOutcome::Success(_) | CallOutcome::NotFound => {
                usable += 1;
                "OK"
            }
            CallOutcome::QuotaExceeded => "QUOTA EXHAUSTED",
            CallOutcome::AuthError => "INVALID",
            CallOutcome::Transient(ref msg) => {
                tracing::debug!("Probe for '{}' failed transiently: {}", entry.id, msg);
                "UNREACHABLE"
            }
        };
        println!("  {:20} {}", entry.id, status);

        tokio::time::sleep(std::time::Duration::from_millis(config.quota.rate_limit_ms)).await;
    }

    println!("\n{}/{} credentials usable", usable, config.credential.len());
    if usable == 0 {
        anyhow::bail!("no usable credentials");
    }
    Ok(())
}

/// Handles --export: rewrites the CSV from the latest checkpoint
fn handle_export(config: &creator_atlas::Config) -> anyhow::Result<()> {
    let mut store = CheckpointStore::new(&config.output.checkpoint_path);
    let checkpoint = store
        .load()?
        .context("no checkpoint found; nothing to export")?;

    write_csv(
        &checkpoint.records,
        std::path::Path::new(&config.output.csv_path),
    )?;

    println!(
        "✓ Exported {} records from checkpoint #{} to {}",
        checkpoint.records.len(),
        checkpoint.sequence,
        config.output.csv_path
    );
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: creator_atlas::Config,
    config_hash: String,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting run (will resume if a checkpoint exists)");
    }

    tracing::info!(
        "Credentials: {}, categories: {}, cities: {}",
        config.credential.len(),
        config.category.len(),
        config.city.len()
    );

    let summary = harvest(config, config_hash, fresh).await?;

    if summary.interrupted {
        tracing::info!(
            "Run interrupted; {} records saved, resume with the same command",
            summary.accepted
        );
    } else {
        tracing::info!(
            "Run complete: {} records, {} tasks done, {} tasks skipped as failed",
            summary.accepted,
            summary.tasks_done,
            summary.tasks_failed
        );
    }

    Ok(())
}
