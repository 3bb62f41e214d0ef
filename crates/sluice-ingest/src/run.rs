//! The extraction loop.
//!
//! - Live mode: discover, process, sleep `cycle_delay`, repeat until shutdown.
//! - Historical mode: one discovery pass over the whole folder, then stop.
//!
//! Files that succeed but stay in the folder (`--keep-processed`, or a failed
//! move or delete) are remembered for the rest of the run and not posted again.
//!
//! Before the loop starts, the known series are fetched from the store with
//! bounded retry. Failing that fetch is the only runtime error that ends the
//! process.

use crate::config::IngestConfig;
use crate::orchestrator::{CycleStats, Orchestrator};
use crate::resolver::SeriesCache;
use crate::scheduler::{FileScheduler, Mode, ScanWindow, SettledFiles};
use crate::store::SeriesStore;
use crate::{Error, Result};
use chrono::Utc;
use parking_lot::Mutex;
use sluice_core::metrics::{self, FILES_AVAILABLE, RUNNING};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
// Shutdown
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

/// Cloneable shutdown signal.
///
/// Triggering it is sticky: once set, [`Shutdown::is_triggered`] stays true
/// and every pending or future [`Shutdown::sleep`] returns immediately.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless shutdown is triggered first.
    ///
    /// Returns `true` if the sleep was cut short by shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost.
        notified.as_mut().enable();
        if self.is_triggered() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_triggered(),
            _ = notified => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Startup listing
// ═══════════════════════════════════════════════════════════════════════════

/// Bounded linear backoff: attempt `n` is followed by a wait of `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Fetch every known series from the store and build the cache.
///
/// Returns [`Error::ListingFetch`] once all attempts are used up or
/// shutdown is requested while waiting.
pub async fn fetch_series_cache(
    store: &dyn SeriesStore,
    policy: RetryPolicy,
    shutdown: &Shutdown,
) -> Result<SeriesCache> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match store.list_series().await {
            Ok(listing) => {
                let cache = SeriesCache::from_listing(listing);
                info!(
                    "Loaded {} known series from {} store",
                    cache.len(),
                    store.name()
                );
                return Ok(cache);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(Error::ListingFetch {
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.delay_after(attempt);
        warn!(
            "Could not list series (attempt {}/{}): {}. Retrying in {:?}",
            attempt, max_attempts, err, delay
        );
        if shutdown.sleep(delay).await {
            return Err(Error::ListingFetch {
                attempts: attempt,
                source: err,
            });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Run loop
// ═══════════════════════════════════════════════════════════════════════════

/// Totals for a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: usize,
    pub stats: CycleStats,
    pub elapsed: Duration,
}

/// Discovers files and feeds them to the orchestrator, cycle after cycle.
pub struct Extractor {
    scheduler: FileScheduler,
    orchestrator: Arc<Orchestrator>,
    window: ScanWindow,
    cycle_delay: Duration,
    mode: Mode,
    settled: Mutex<SettledFiles>,
}

impl Extractor {
    pub fn new(
        config: &IngestConfig,
        store: Arc<dyn SeriesStore>,
        cache: Arc<SeriesCache>,
    ) -> Self {
        let orchestrator = Orchestrator::new(store, cache, config.orchestrator_config());
        Self {
            scheduler: FileScheduler::new(config.scheduler_config()),
            orchestrator: Arc::new(orchestrator),
            window: config.window,
            cycle_delay: config.cycle_delay,
            mode: config.mode,
            settled: Mutex::new(SettledFiles::new()),
        }
    }

    /// Discover and process one batch of files.
    ///
    /// A folder that cannot be listed is logged and yields an empty cycle.
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> CycleStats {
        let scanned = {
            let settled = self.settled.lock();
            self.scheduler.list_eligible(Utc::now(), self.window, &settled)
        };
        let scan = match scanned {
            Ok(scan) => scan,
            Err(e) => {
                error!("{}", e);
                return CycleStats::default();
            }
        };
        metrics::set_gauge(FILES_AVAILABLE, self.mode.as_str(), scan.total_eligible as f64);

        if scan.tasks.is_empty() {
            debug!("No eligible files");
            return CycleStats::default();
        }

        info!(
            "Processing {} files ({} eligible)",
            scan.tasks.len(),
            scan.total_eligible
        );
        let started = Instant::now();
        let mut stats = self.orchestrator.process_files(scan.tasks, shutdown).await;

        let kept = std::mem::take(&mut stats.kept);
        if !kept.is_empty() {
            let mut settled = self.settled.lock();
            for task in &kept {
                settled.insert(task);
            }
            settled.prune();
            debug!("{} processed files remain in the input folder", settled.len());
        }

        info!(
            "Cycle done in {:.1}s: {} succeeded, {} failed, {} points",
            started.elapsed().as_secs_f64(),
            stats.files_succeeded,
            stats.files_failed,
            stats.points_posted
        );
        stats
    }

    /// Run until the folder is drained (historical) or shutdown (live).
    pub async fn run(&self, shutdown: &Shutdown) -> RunSummary {
        let started = Instant::now();
        let mode = self.mode.as_str();
        let mut summary = RunSummary::default();

        metrics::set_gauge(RUNNING, mode, 1.0);
        info!("Extractor running in {} mode", self.mode);

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let stats = self.run_cycle(shutdown).await;
            summary.cycles += 1;
            summary.stats.merge(&stats);

            if self.mode == Mode::Historical {
                break;
            }
            if shutdown.sleep(self.cycle_delay).await {
                break;
            }
        }

        metrics::set_gauge(RUNNING, mode, 0.0);
        summary.elapsed = started.elapsed();
        summary
    }
}
