//! Telemetr-Harvest main entry point
//!
//! Command-line interface for the channel catalog harvester.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use telemetr_harvest::config::load_config;
use telemetr_harvest::crawler::quota::QuotaMonitor;
use telemetr_harvest::crawler::{build_http_client, Driver};
use telemetr_harvest::state::RunState;
use tracing_subscriber::EnvFilter;

/// Telemetr-Harvest: a channel catalog harvester
///
/// Walks the paginated channel catalog with the configured filters, resolves
/// each channel to a detailed record, and persists the batch as JSON and CSV.
/// With --serve, exposes the run lifecycle over a small HTTP API instead.
#[derive(Parser, Debug)]
#[command(name = "telemetr-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A channel catalog harvester", long_about = None)]
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

    /// Run the web control plane instead of a one-shot crawl
    #[arg(long, conflicts_with = "limits")]
    serve: bool,

    /// Fetch and print the account's usage limits and exit
    #[arg(long, conflicts_with = "serve")]
    limits: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.serve {
        handle_serve(config).await
    } else if cli.limits {
        handle_limits(&config).await
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("telemetr_harvest=info,warn"),
            1 => EnvFilter::new("telemetr_harvest=debug,info"),
            2 => EnvFilter::new("telemetr_harvest=trace,debug"),
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

/// Handles --serve: runs the control plane until interrupted
async fn handle_serve(config: Arc<telemetr_harvest::AppConfig>) -> anyhow::Result<()> {
    let run_state = Arc::new(RunState::new());
    telemetr_harvest::server::serve(config, run_state).await
}

/// Handles --limits: prints the account's usage limits
async fn handle_limits(config: &telemetr_harvest::AppConfig) -> anyhow::Result<()> {
    let client = build_http_client(&config.http, &config.site.base_url)?;
    let monitor = QuotaMonitor::new(client, &config.site.base_url, &config.site.gate_limit_name);

    let limits = monitor.check().await?;
    if limits.is_empty() {
        println!("No limits found on the profile page");
        return Ok(());
    }

    for limit in limits {
        println!(
            "{:?}  {}: {} / {}",
            limit.severity, limit.name, limit.current, limit.maximum
        );
    }

    Ok(())
}

/// Handles the default mode: a one-shot crawl in the foreground
async fn handle_crawl(config: Arc<telemetr_harvest::AppConfig>) -> anyhow::Result<()> {
    let run_state = Arc::new(RunState::new());
    if !run_state.try_begin_run() {
        anyhow::bail!("a run is already active");
    }

    let driver = Driver::new(config, run_state.clone())?;
    let result = driver.run().await;
    match &result {
        Ok(report) => run_state.finish_run(Some(report.status_message())),
        Err(e) => run_state.finish_run(Some(e.to_string())),
    }

    let report = result?;

    println!("{}", report.status_message());
    for record in &report.records {
        println!("----------------------------------------");
        println!("Title:       {}", record.title);
        println!("Link:        {}", record.link);
        println!("Handle:      {}", record.handle);
        match record.subscribers {
            Some(n) => println!("Subscribers: {}", n),
            None => println!("Subscribers: n/a"),
        }
        if let Some(admins) = &record.admins {
            for admin in admins {
                println!("Admin:       {} <{}>", admin.label, admin.link);
            }
        }
    }

    Ok(())
}
