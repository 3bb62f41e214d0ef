//! Per-file ingestion and the bounded worker pool that runs it.
//!
//! # File States
//!
//! ```text
//! Eligible ──parse──▶ ParseFailed ───────────────▶ moved to failed/ | left in place
//!              │
//!              ▼
//!           Parsed ──dispatch──▶ DispatchFailed ─▶ moved to failed/ | left in place
//!                         │
//!                         ▼
//!                     Succeeded ─────────────────▶ deleted | moved to finished/ | kept
//! ```
//!
//! A file that disappears before it can be read was taken by another
//! extractor and is skipped without counting it.

use crate::batcher::{Batch, Batcher, build_points};
use crate::lifecycle::{Disposition, LifecyclePolicy};
use crate::resolver::{SeriesCache, SeriesResolver};
use crate::run::Shutdown;
use crate::scheduler::{FileTask, Mode};
use crate::store::SeriesStore;
use crate::table::{self, Table};
use crate::{Error, Result};
use sluice_core::metrics::{
    self, FILE_DURATION_SECONDS, FILES_FAILED_TOTAL, FILES_REMAINING, FILES_SUCCEEDED_TOTAL,
    POINTS_POSTED_PER_SERIES_TOTAL, POINTS_POSTED_TOTAL, SERIES_IN_LAST_FILE,
};
use sluice_core::{BATCH_MAX, SeriesPoints};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Files processed at the same time.
    pub concurrency: usize,
    /// Series entries per write request.
    pub max_batch_series: usize,
    pub lifecycle: LifecyclePolicy,
    pub mode: Mode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_batch_series: BATCH_MAX,
            lifecycle: LifecyclePolicy::default(),
            mode: Mode::Live,
        }
    }
}

/// How processing a file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Succeeded,
    ParseFailed,
    DispatchFailed,
    /// The file was gone before it could be read.
    Vanished,
}

/// Result of processing one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    /// Data rows parsed.
    pub rows: usize,
    /// Series entries with at least one point.
    pub series: usize,
    /// Points accepted by the store.
    pub points_posted: usize,
    /// Write requests that succeeded.
    pub batches: usize,
    /// Where the file ended up; `None` if archival failed or was skipped.
    pub disposition: Option<Disposition>,
    pub elapsed: Duration,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: FileOutcome::Succeeded,
            rows: 0,
            series: 0,
            points_posted: 0,
            batches: 0,
            disposition: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Aggregate statistics for one or more cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub files_vanished: usize,
    pub points_posted: usize,
    pub batches_posted: usize,
    /// Succeeded files that are still in the input folder.
    pub kept: Vec<FileTask>,
}

impl CycleStats {
    /// Fold a file report into the stats, remembering `task` if the file
    /// succeeded but was not deleted or moved.
    pub fn record_task(&mut self, task: FileTask, report: &FileReport) {
        let archived = matches!(
            report.disposition,
            Some(Disposition::Deleted | Disposition::Moved(_))
        );
        if report.outcome == FileOutcome::Succeeded && !archived {
            self.kept.push(task);
        }
        self.record(report);
    }

    /// Fold a file report into the stats.
    pub fn record(&mut self, report: &FileReport) {
        match report.outcome {
            FileOutcome::Succeeded => self.files_succeeded += 1,
            FileOutcome::ParseFailed | FileOutcome::DispatchFailed => self.files_failed += 1,
            FileOutcome::Vanished => self.files_vanished += 1,
        }
        self.points_posted += report.points_posted;
        self.batches_posted += report.batches;
    }

    /// Add another cycle's stats.
    pub fn merge(&mut self, other: &CycleStats) {
        self.files_succeeded += other.files_succeeded;
        self.files_failed += other.files_failed;
        self.files_vanished += other.files_vanished;
        self.points_posted += other.points_posted;
        self.batches_posted += other.batches_posted;
        self.kept.extend(other.kept.iter().cloned());
    }

    /// Files that reached a terminal state.
    pub fn files_processed(&self) -> usize {
        self.files_succeeded + self.files_failed
    }
}

/// Drives parsing, resolution, batching and dispatch for each file.
pub struct Orchestrator {
    store: Arc<dyn SeriesStore>,
    resolver: SeriesResolver,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        cache: Arc<SeriesCache>,
        config: OrchestratorConfig,
    ) -> Self {
        let resolver = SeriesResolver::new(Arc::clone(&store), cache, config.mode);
        Self {
            store,
            resolver,
            config,
        }
    }

    /// Process a cycle's files with bounded concurrency.
    ///
    /// Once `shutdown` is triggered no further files are started; files
    /// already in flight run to completion.
    pub async fn process_files(
        self: &Arc<Self>,
        tasks: Vec<FileTask>,
        shutdown: &Shutdown,
    ) -> CycleStats {
        let mode = self.config.mode.as_str();
        metrics::set_gauge(FILES_REMAINING, mode, tasks.len() as f64);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers = JoinSet::new();
        let mut stats = CycleStats::default();

        for task in tasks {
            if shutdown.is_triggered() {
                info!("Shutdown requested, not starting remaining files");
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if shutdown.is_triggered() {
                info!("Shutdown requested, not starting remaining files");
                break;
            }

            let this = Arc::clone(self);
            workers.spawn(async move {
                let _permit = permit;
                let report = this.process_file(&task.path).await;
                (task, report)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((task, report)) => stats.record_task(task, &report),
                Err(e) => {
                    error!("File worker failed: {}", Error::Worker(e));
                    metrics::increment(FILES_FAILED_TOTAL, mode, 1);
                    stats.files_failed += 1;
                }
            }
            metrics::decrement_gauge(FILES_REMAINING, mode, 1.0);
        }

        metrics::set_gauge(FILES_REMAINING, mode, 0.0);
        stats
    }

    /// Run one file through the whole pipeline and settle it.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        let started = Instant::now();
        let mode = self.config.mode.as_str();
        let mut report = FileReport::new(path);

        let table = match parse_blocking(path).await {
            Ok(table) => table,
            Err(Error::Vanished(_)) => {
                debug!("{} vanished, another extractor picked it up", path.display());
                report.outcome = FileOutcome::Vanished;
                report.elapsed = started.elapsed();
                return report;
            }
            Err(e) => {
                warn!("{}", e);
                report.outcome = FileOutcome::ParseFailed;
                return self.settle(report, started).await;
            }
        };
        report.rows = table.row_count();

        match self.dispatch_table(path, &table, &mut report).await {
            Ok(()) => metrics::set_gauge(SERIES_IN_LAST_FILE, mode, report.series as f64),
            Err(e) => {
                warn!("{}", e);
                report.outcome = FileOutcome::DispatchFailed;
            }
        }

        self.settle(report, started).await
    }

    /// Resolve, batch and post every column of a parsed table.
    async fn dispatch_table(
        &self,
        path: &Path,
        table: &Table,
        report: &mut FileReport,
    ) -> Result<()> {
        let mut batcher = Batcher::new(self.config.max_batch_series);

        for column in &table.columns {
            let resolution = self.resolver.resolve(&column.header).await;
            let Some(id) = resolution.usable_id() else {
                continue;
            };

            let points = build_points(&column.cells, &table.timestamps);
            if points.is_empty() {
                continue;
            }
            report.series += 1;

            let entry = SeriesPoints {
                id: id.clone(),
                points,
            };
            if let Some(batch) = batcher.push(entry) {
                self.post(path, &batch, report).await?;
            }
        }

        if let Some(batch) = batcher.finish() {
            self.post(path, &batch, report).await?;
        }
        Ok(())
    }

    async fn post(&self, path: &Path, batch: &Batch, report: &mut FileReport) -> Result<()> {
        self.store
            .write_batch(batch)
            .await
            .map_err(|source| Error::Dispatch {
                path: path.to_path_buf(),
                series: batch.len(),
                source,
            })?;

        let mode = self.config.mode.as_str();
        let points = batch.point_count();
        report.points_posted += points;
        report.batches += 1;
        metrics::increment(POINTS_POSTED_TOTAL, mode, points as u64);
        for entry in batch.entries() {
            metrics::increment_series(
                POINTS_POSTED_PER_SERIES_TOTAL,
                mode,
                entry.id.as_str(),
                entry.points.len() as u64,
            );
        }
        debug!(
            "Posted {} points for {} series from {}",
            points,
            batch.len(),
            path.display()
        );
        Ok(())
    }

    /// Apply the lifecycle action and record per-file metrics.
    async fn settle(&self, mut report: FileReport, started: Instant) -> FileReport {
        let mode = self.config.mode.as_str();
        let lifecycle = &self.config.lifecycle;

        let settled = if report.outcome == FileOutcome::Succeeded {
            metrics::increment(FILES_SUCCEEDED_TOTAL, mode, 1);
            lifecycle.settle_success(&report.path).await
        } else {
            metrics::increment(FILES_FAILED_TOTAL, mode, 1);
            lifecycle.settle_failure(&report.path).await
        };

        match settled {
            Ok(disposition) => report.disposition = Some(disposition),
            Err(e) => warn!("{}", e),
        }

        report.elapsed = started.elapsed();
        metrics::record_seconds(FILE_DURATION_SECONDS, mode, report.elapsed.as_secs_f64());
        debug!(
            "{} {:?} in {:?}: {} rows, {} series, {} points",
            report.path.display(),
            report.outcome,
            report.elapsed,
            report.rows,
            report.series,
            report.points_posted
        );
        report
    }
}

/// Parse a file on the blocking pool.
async fn parse_blocking(path: &Path) -> Result<Table> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || table::parse_file(&owned)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{FailureAction, SuccessAction};
    use crate::store::{MemoryStore, NewSeries, SeriesInfo, StoreError};
    use async_trait::async_trait;
    use chrono::Utc;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use sluice_core::{Point, SeriesId};
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Helpers
    // =========================================================================

    const SAMPLE: &str = ";A:ext1;B:ext2\nunit;unit;unit\n1000;1.5;\n2000;;3,0\n";

    fn id(s: &str) -> SeriesId {
        SeriesId::new(s).unwrap()
    }

    fn cache(ids: &[&str]) -> Arc<SeriesCache> {
        Arc::new(SeriesCache::from_listing(ids.iter().map(|s| SeriesInfo {
            id: id(s),
            name: String::new(),
        })))
    }

    fn orchestrator(
        store: &Arc<MemoryStore>,
        cache: Arc<SeriesCache>,
        config: OrchestratorConfig,
    ) -> Arc<Orchestrator> {
        let store: Arc<dyn SeriesStore> = Arc::clone(store) as Arc<dyn SeriesStore>;
        Arc::new(Orchestrator::new(store, cache, config))
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn task(path: PathBuf) -> FileTask {
        FileTask {
            path,
            modified: Utc::now(),
            embedded_timestamp: None,
        }
    }

    /// Run `f` on a current-thread runtime with a private Prometheus recorder
    /// and return its output together with the rendered metrics.
    fn with_metrics<T>(f: impl FnOnce(&tokio::runtime::Runtime) -> T) -> (T, String) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let out = ::metrics::with_local_recorder(&recorder, || f(&runtime));
        (out, handle.render())
    }

    fn metric_line<'a>(rendered: &'a str, name: &str) -> Option<&'a str> {
        rendered.lines().find(|l| l.starts_with(name))
    }

    fn sample_value(line: &str) -> f64 {
        line.rsplit(' ').next().unwrap().parse().unwrap()
    }

    /// Store whose writes panic, to exercise worker failures.
    struct PanickingStore;

    #[async_trait]
    impl SeriesStore for PanickingStore {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn list_series(&self) -> std::result::Result<Vec<SeriesInfo>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_series(&self, _series: &NewSeries) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn write_batch(&self, _batch: &Batch) -> std::result::Result<(), StoreError> {
            panic!("write exploded");
        }
    }

    // =========================================================================
    // Single file
    // =========================================================================

    #[tokio::test]
    async fn test_end_to_end_sample_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "TEBIS_FK_1550092560.csv", SAMPLE);
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&["ext1"]), OrchestratorConfig::default());

        let report = orch.process_file(&path).await;

        assert_eq!(report.outcome, FileOutcome::Succeeded);
        assert_eq!(report.rows, 2);
        assert_eq!(report.series, 2);
        assert_eq!(report.points_posted, 2);
        assert_eq!(report.disposition, Some(Disposition::Deleted));
        assert!(!path.exists());

        let created = store.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, id("ext2"));
        assert_eq!(created[0].name, "B");

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            Batch::from_entries(vec![
                SeriesPoints {
                    id: id("ext1"),
                    points: vec![Point::new(1_000_000, 1.5)],
                },
                SeriesPoints {
                    id: id("ext2"),
                    points: vec![Point::new(2_000_000, 3.0)],
                },
            ])
        );
    }

    #[tokio::test]
    async fn test_success_moves_to_finished() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "ok.csv", SAMPLE);
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            lifecycle: LifecyclePolicy::from_flags(tmp.path(), false, true, false),
            ..Default::default()
        };
        let orch = orchestrator(&store, cache(&[]), config);

        let report = orch.process_file(&path).await;
        let target = tmp.path().join("finished").join("ok.csv");
        assert_eq!(report.disposition, Some(Disposition::Moved(target.clone())));
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_parse_failure_moves_to_failed() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "bad.csv", "A:ext1;B:ext2\nu;u\n1;2\n");
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            lifecycle: LifecyclePolicy {
                on_success: SuccessAction::Delete,
                on_failure: FailureAction::MoveTo(tmp.path().join("failed")),
            },
            ..Default::default()
        };
        let orch = orchestrator(&store, cache(&[]), config);

        let report = orch.process_file(&path).await;
        assert_eq!(report.outcome, FileOutcome::ParseFailed);
        assert!(tmp.path().join("failed").join("bad.csv").exists());
        assert!(store.batches().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_file_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "retry.csv", SAMPLE);
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let orch = orchestrator(&store, cache(&["ext1", "ext2"]), OrchestratorConfig::default());

        let report = orch.process_file(&path).await;
        assert_eq!(report.outcome, FileOutcome::DispatchFailed);
        assert_eq!(report.disposition, Some(Disposition::LeftInPlace));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_create_failure_drops_column_only() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "partial.csv", SAMPLE);
        let store = Arc::new(MemoryStore::new());
        store.fail_create_for(id("ext2"));
        let cache = cache(&["ext1"]);
        let orch = orchestrator(&store, Arc::clone(&cache), OrchestratorConfig::default());

        let report = orch.process_file(&path).await;
        assert_eq!(report.outcome, FileOutcome::Succeeded);
        assert_eq!(report.series, 1);
        assert_eq!(store.points_written(), 1);
        assert!(!cache.contains("ext2"));
    }

    #[tokio::test]
    async fn test_vanished_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let report = orch.process_file(&tmp.path().join("taken.csv")).await;
        assert_eq!(report.outcome, FileOutcome::Vanished);
        assert_eq!(report.disposition, None);
    }

    #[tokio::test]
    async fn test_wide_file_is_split_into_capped_batches() {
        let tmp = TempDir::new().unwrap();
        let headers: Vec<String> = (0..25).map(|i| format!("S{i}:ts-{i}")).collect();
        let content = format!(
            ";{}\n{}\n1000;{}\n",
            headers.join(";"),
            vec!["u"; 26].join(";"),
            vec!["1"; 25].join(";")
        );
        let path = write(tmp.path(), "wide.csv", &content);
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            max_batch_series: 10,
            ..Default::default()
        };
        let orch = orchestrator(&store, cache(&[]), config);

        let report = orch.process_file(&path).await;
        assert_eq!(report.outcome, FileOutcome::Succeeded);
        assert_eq!(report.batches, 3);
        let sizes: Vec<usize> = store.batches().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(store.created().len(), 25);
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    #[tokio::test]
    async fn test_cycle_processes_all_files_independently() {
        let tmp = TempDir::new().unwrap();
        let mut tasks = Vec::new();
        for i in 0..12 {
            tasks.push(task(write(tmp.path(), &format!("f{i}.csv"), SAMPLE)));
        }
        tasks.push(task(write(tmp.path(), "broken.csv", "no index\n")));
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            concurrency: 3,
            ..Default::default()
        };
        let orch = orchestrator(&store, cache(&[]), config);

        let stats = orch.process_files(tasks, &Shutdown::new()).await;

        assert_eq!(stats.files_succeeded, 12);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.points_posted, 24);
        // Two new series across twelve concurrent files.
        assert_eq!(store.created().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_admitting_files() {
        let tmp = TempDir::new().unwrap();
        let tasks = vec![task(write(tmp.path(), "a.csv", SAMPLE))];
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let shutdown = Shutdown::new();
        shutdown.trigger();
        let stats = orch.process_files(tasks, &shutdown).await;

        assert_eq!(stats, CycleStats::default());
        assert!(tmp.path().join("a.csv").exists());
    }

    #[tokio::test]
    async fn test_cycle_reports_files_left_in_place() {
        let tmp = TempDir::new().unwrap();
        let kept = task(write(tmp.path(), "kept.csv", SAMPLE));
        let broken = task(write(tmp.path(), "broken.csv", "no index\n"));
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            lifecycle: LifecyclePolicy::from_flags(tmp.path(), false, false, true),
            ..Default::default()
        };
        let orch = orchestrator(&store, cache(&[]), config);

        let stats = orch
            .process_files(vec![kept.clone(), broken], &Shutdown::new())
            .await;

        assert_eq!(stats.files_succeeded, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.kept, vec![kept]);
    }

    #[tokio::test]
    async fn test_deleted_files_are_not_reported_as_kept() {
        let tmp = TempDir::new().unwrap();
        let tasks = vec![task(write(tmp.path(), "a.csv", SAMPLE))];
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let stats = orch.process_files(tasks, &Shutdown::new()).await;
        assert_eq!(stats.files_succeeded, 1);
        assert!(stats.kept.is_empty());
    }

    #[test]
    fn test_cycle_stats_merge() {
        let mut total = CycleStats::default();
        let cycle = CycleStats {
            files_succeeded: 2,
            files_failed: 1,
            files_vanished: 0,
            points_posted: 40,
            batches_posted: 2,
            kept: vec![task(PathBuf::from("/in/a.csv"))],
        };
        total.merge(&cycle);
        total.merge(&cycle);
        assert_eq!(total.files_processed(), 6);
        assert_eq!(total.points_posted, 80);
        assert_eq!(total.kept.len(), 2);
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    #[test]
    fn test_worker_panic_counts_as_failed_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "boom.csv", SAMPLE);
        let store: Arc<dyn SeriesStore> = Arc::new(PanickingStore);
        let orch = Arc::new(Orchestrator::new(
            store,
            cache(&[]),
            OrchestratorConfig::default(),
        ));

        let (stats, rendered) = with_metrics(|rt| {
            rt.block_on(orch.process_files(vec![task(path.clone())], &Shutdown::new()))
        });

        assert_eq!(stats.files_failed, 1);
        assert!(path.exists());
        let line = metric_line(&rendered, FILES_FAILED_TOTAL).unwrap();
        assert!(line.contains("mode=\"live\""));
        assert_eq!(sample_value(line), 1.0);
    }

    #[test]
    fn test_series_gauge_only_tracks_successful_files() {
        let tmp = TempDir::new().unwrap();
        let good = write(tmp.path(), "good.csv", SAMPLE);
        let bad = write(tmp.path(), "bad.csv", ";A:ext1\nunit;unit\n1000;1\n");
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let (outcomes, rendered) = with_metrics(|rt| {
            rt.block_on(async {
                let first = orch.process_file(&good).await.outcome;
                store.fail_writes(true);
                let second = orch.process_file(&bad).await.outcome;
                (first, second)
            })
        });

        assert_eq!(
            outcomes,
            (FileOutcome::Succeeded, FileOutcome::DispatchFailed)
        );
        let line = metric_line(&rendered, SERIES_IN_LAST_FILE).unwrap();
        assert_eq!(sample_value(line), 2.0);
    }

    #[test]
    fn test_failed_dispatch_leaves_series_gauge_unset() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "bad.csv", SAMPLE);
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let (report, rendered) = with_metrics(|rt| rt.block_on(orch.process_file(&path)));

        assert_eq!(report.outcome, FileOutcome::DispatchFailed);
        assert!(metric_line(&rendered, SERIES_IN_LAST_FILE).is_none());
    }

    #[test]
    fn test_points_counted_per_series() {
        let tmp = TempDir::new().unwrap();
        let first = write(tmp.path(), "a.csv", SAMPLE);
        let second = write(tmp.path(), "b.csv", ";A:ext1\nunit;unit\n1000;1\n2000;2\n");
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(&store, cache(&[]), OrchestratorConfig::default());

        let (_, rendered) = with_metrics(|rt| {
            rt.block_on(async {
                orch.process_file(&first).await;
                orch.process_file(&second).await;
            })
        });

        let series_line = |id: &str| {
            rendered
                .lines()
                .find(|l| {
                    l.starts_with(POINTS_POSTED_PER_SERIES_TOTAL)
                        && l.contains(&format!("series=\"{id}\""))
                })
                .unwrap()
        };
        assert_eq!(sample_value(series_line("ext1")), 3.0);
        assert_eq!(sample_value(series_line("ext2")), 1.0);
        let total = metric_line(&rendered, POINTS_POSTED_TOTAL).unwrap();
        assert_eq!(sample_value(total), 4.0);
    }
}
