//! Sluice extractor daemon.
//!
//! Watches a folder for sensor exports and posts their columns as time series.
//!
//! # Usage
//!
//! ```bash
//! # Follow a drop folder, newest files first
//! sluice-ingest --input /data/exports --live --move-failed
//!
//! # Backfill everything exported before a point in time, then exit
//! sluice-ingest --input /data/backlog --historical --until 1550092560 --move-finished
//!
//! # Parse and batch without talking to the API
//! sluice-ingest --input /data/exports --historical --keep-processed --dry-run
//! ```
//!
//! # Graceful Shutdown
//!
//! On SIGINT (Ctrl+C) the extractor:
//! 1. Stops starting new files
//! 2. Lets files already in flight finish and settle
//! 3. Skips the remaining inter-cycle sleep and exits

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use clap::{ArgGroup, Parser};
use sluice_core::metrics::{init_metrics, start_metrics_server};
use sluice_ingest::{
    Extractor, HttpSeriesStore, HttpStoreConfig, IngestConfig, MemoryStore, Mode, RetryPolicy,
    ScanWindow, SeriesStore, Shutdown, fetch_series_cache,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sluice extractor daemon.
#[derive(Parser, Debug)]
#[command(name = "sluice-ingest")]
#[command(about = "Post delimited sensor exports to a time-series store")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["live", "historical"])))]
struct Args {
    /// Folder containing the files to process
    #[arg(long, short)]
    input: PathBuf,

    /// Poll the folder forever, newest files first
    #[arg(long)]
    live: bool,

    /// Process every file once, oldest first, then exit
    #[arg(long)]
    historical: bool,

    /// Only pick up files modified after this unix timestamp
    #[arg(long)]
    since: Option<i64>,

    /// Only pick up files whose name timestamp is before this unix timestamp
    #[arg(long, short)]
    until: Option<i64>,

    /// Move files that fail into <input>/failed
    #[arg(long)]
    move_failed: bool,

    /// Move processed files into <input>/finished instead of deleting them
    #[arg(long)]
    move_finished: bool,

    /// Leave processed files in place
    #[arg(long)]
    keep_processed: bool,

    /// Base URL of the time-series API
    #[arg(long, env = "SLUICE_API_URL")]
    api_url: Option<String>,

    /// API key sent with every request
    #[arg(long, short = 'k', env = "SLUICE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "SLUICE_API_TIMEOUT_SECS", default_value = "30")]
    api_timeout_secs: u64,

    /// Use an in-memory store instead of the API
    #[arg(long)]
    dry_run: bool,

    /// Files processed at the same time
    #[arg(long, default_value = "10")]
    concurrency: usize,

    /// Live mode: maximum files per cycle
    #[arg(long, default_value = "20")]
    max_files_per_cycle: usize,

    /// Live mode: seconds to wait between cycles
    #[arg(long, default_value = "8")]
    cycle_delay_secs: u64,

    /// Minimum age in seconds before a file is picked up
    #[arg(long, default_value = "2")]
    quiescence_secs: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

impl Args {
    fn ingest_config(&self) -> Result<IngestConfig> {
        let mode = if self.live {
            Mode::Live
        } else {
            Mode::Historical
        };
        let window = ScanWindow {
            since: self.since.map(unix_seconds).transpose()?,
            until: self.until.map(unix_seconds).transpose()?,
        };

        Ok(IngestConfig {
            input: self.input.clone(),
            mode,
            window,
            move_failed: self.move_failed,
            move_finished: self.move_finished,
            keep_processed: self.keep_processed,
            concurrency: self.concurrency,
            max_files_per_cycle: self.max_files_per_cycle,
            cycle_delay: Duration::from_secs(self.cycle_delay_secs),
            quiescence: Duration::from_secs(self.quiescence_secs),
            ..Default::default()
        })
    }

    fn store(&self) -> Result<Arc<dyn SeriesStore>> {
        if self.dry_run {
            tracing::warn!("Dry run: nothing will be posted");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let Some(base_url) = self.api_url.clone() else {
            bail!("--api-url (or SLUICE_API_URL) is required unless --dry-run is set");
        };
        let store = HttpSeriesStore::new(HttpStoreConfig {
            base_url,
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.api_timeout_secs),
            ..Default::default()
        })
        .context("Failed to create HTTP store")?;
        Ok(Arc::new(store))
    }
}

fn unix_seconds(secs: i64) -> Result<DateTime<chrono::Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("timestamp {secs} is out of range"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if it exists, then re-read flags that fall back to env vars
    let args = if Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
        Args::parse()
    } else {
        args
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("sluice_ingest=debug".parse()?),
        )
        .init();

    tracing::info!("Sluice extractor starting...");

    let config = args.ingest_config()?;
    config.validate()?;

    tracing::info!("Configuration:");
    tracing::info!("  Input: {}", config.input.display());
    tracing::info!("  Mode: {}", config.mode);
    tracing::info!("  Concurrency: {}", config.concurrency);
    if config.mode == Mode::Live {
        tracing::info!("  Files per cycle: {}", config.max_files_per_cycle);
        tracing::info!("  Cycle delay: {:?}", config.cycle_delay);
    }
    if let Some(since) = config.window.since {
        tracing::info!("  Since: {}", since);
    }
    if let Some(until) = config.window.until {
        tracing::info!("  Until: {}", until);
    }
    tracing::info!("  Lifecycle: {:?}", config.lifecycle());
    tracing::info!(
        "  API: {}",
        if args.dry_run {
            "dry run"
        } else {
            args.api_url.as_deref().unwrap_or("unset")
        }
    );

    // Initialize metrics
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
    }

    // Set up graceful shutdown
    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        handler_shutdown.trigger();
    })
    .context("Failed to set Ctrl+C handler")?;

    let store = args.store()?;
    let cache = fetch_series_cache(store.as_ref(), RetryPolicy::default(), &shutdown)
        .await
        .context("Cannot start without the list of known series")?;
    let known_series = cache.len();

    let extractor = Extractor::new(&config, store, Arc::new(cache));
    let summary = extractor.run(&shutdown).await;

    // Print summary
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("EXTRACTION COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Mode:              {}", config.mode);
    tracing::info!("Cycles:            {}", summary.cycles);
    tracing::info!("Files succeeded:   {}", summary.stats.files_succeeded);
    tracing::info!("Files failed:      {}", summary.stats.files_failed);
    tracing::info!("Files vanished:    {}", summary.stats.files_vanished);
    tracing::info!("Batches posted:    {}", summary.stats.batches_posted);
    tracing::info!("Points posted:     {}", summary.stats.points_posted);
    tracing::info!("Series at start:   {}", known_series);
    tracing::info!("Elapsed:           {:.1}s", summary.elapsed.as_secs_f64());

    Ok(())
}
