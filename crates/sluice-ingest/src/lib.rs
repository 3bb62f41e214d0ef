//! Sluice ingestion pipeline.
//!
//! Picks up `;`-separated sensor exports from a folder and republishes every
//! column as a time series in a remote store.
//!
//! # Modules
//!
//! - [`scheduler`] - File discovery, quiescence and ordering
//! - [`table`] - Parsing one file into columns
//! - [`resolver`] - Header to series id, with on-demand creation
//! - [`batcher`] - Points and size-capped write batches
//! - [`orchestrator`] - Per-file pipeline and bounded worker pool
//! - [`lifecycle`] - Delete/move/keep once a file is done
//! - [`run`] - Live and historical loops, startup listing, shutdown
//! - [`store`] - Remote store trait and adapters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  FileScheduler  │  eligible files, newest (live) or oldest (historical) first
//! └────────┬────────┘
//!          │  Semaphore-bounded workers
//!          ▼
//! ┌─────────────────┐
//! │      Table      │  index column, unit row dropped
//! └────────┬────────┘
//!          │  per column
//!          ▼
//! ┌─────────────────┐      ┌─────────────┐
//! │ SeriesResolver  │─────▶│ SeriesCache │  claim-then-create, once per id
//! └────────┬────────┘      └─────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Batcher     │  at most 1000 series per request
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   SeriesStore   │  HTTP (production) or memory (tests, dry run)
//! └─────────────────┘
//! ```

pub mod batcher;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod resolver;
pub mod run;
pub mod scheduler;
pub mod store;
pub mod table;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use batcher::{Batch, Batcher, build_points};
pub use config::IngestConfig;
pub use lifecycle::{Disposition, FailureAction, LifecyclePolicy, SuccessAction};
pub use orchestrator::{CycleStats, FileOutcome, FileReport, Orchestrator, OrchestratorConfig};
pub use resolver::{Resolution, SeriesCache, SeriesResolver};
pub use run::{Extractor, RetryPolicy, RunSummary, Shutdown, fetch_series_cache};
pub use scheduler::{
    FileScheduler, FileTask, Mode, ScanResult, ScanWindow, SchedulerConfig, SettledFiles,
};
pub use store::{
    HttpSeriesStore, HttpStoreConfig, MemoryStore, NewSeries, SeriesInfo, SeriesStore, StoreError,
};
pub use table::{Column, Table, TableError, parse_file};
