//! Prometheus metrics helpers for the extractor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sluice_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     sluice_core::metrics::increment(sluice_core::metrics::FILES_SUCCEEDED_TOTAL, "live", 1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `extractor_`
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: `mode` (`live` or `historical`), plus `series` on per-series counters

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Series created in the remote store.
pub const SERIES_CREATED_TOTAL: &str = "extractor_series_created_total";
/// Points accepted by the remote store.
pub const POINTS_POSTED_TOTAL: &str = "extractor_points_posted_total";
/// Points accepted by the remote store, per series id.
pub const POINTS_POSTED_PER_SERIES_TOTAL: &str = "extractor_series_points_posted_total";
/// Files processed and archived successfully.
pub const FILES_SUCCEEDED_TOTAL: &str = "extractor_files_succeeded_total";
/// Files that failed to parse or dispatch.
pub const FILES_FAILED_TOTAL: &str = "extractor_files_failed_total";
/// Files of the current cycle not yet finished.
pub const FILES_REMAINING: &str = "extractor_files_remaining";
/// Eligible files found by the last discovery pass.
pub const FILES_AVAILABLE: &str = "extractor_files_available";
/// Distinct series in the most recently finished file.
pub const SERIES_IN_LAST_FILE: &str = "extractor_series_in_last_file";
/// Whether the extractor is running (1) or stopped (0).
pub const RUNNING: &str = "extractor_running";
/// Wall time spent on a single file.
pub const FILE_DURATION_SECONDS: &str = "extractor_file_duration_seconds";

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_extractor_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_extractor_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds `0.0.0.0:<port>` before returning, then serves `/metrics` from a
/// background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<SocketAddr, std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("Metrics server listening on http://{}/metrics", local);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(local)
}

/// Register descriptions for every metric the extractor emits.
fn register_extractor_metrics() {
    describe_counter!(
        SERIES_CREATED_TOTAL,
        "Number of time series created since the extractor started running"
    );
    describe_counter!(
        POINTS_POSTED_TOTAL,
        "Number of datapoints posted since the extractor started running"
    );
    describe_counter!(
        POINTS_POSTED_PER_SERIES_TOTAL,
        "Number of datapoints posted per time series since the extractor started running"
    );
    describe_counter!(
        FILES_SUCCEEDED_TOTAL,
        "Files processed successfully since the extractor started running"
    );
    describe_counter!(
        FILES_FAILED_TOTAL,
        "Files that failed to parse or post since the extractor started running"
    );
    describe_gauge!(
        FILES_REMAINING,
        "Files of the current cycle that have not been finished yet"
    );
    describe_gauge!(
        FILES_AVAILABLE,
        "Eligible csv files found by the last discovery pass"
    );
    describe_gauge!(
        SERIES_IN_LAST_FILE,
        "Distinct time series in the most recently processed file"
    );
    describe_gauge!(RUNNING, "Whether the extractor is running (1=yes, 0=no)");
    describe_histogram!(FILE_DURATION_SECONDS, "Time spent processing one file");
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Increment a counter labelled with the extraction mode.
#[inline]
pub fn increment(name: &'static str, mode: &'static str, count: u64) {
    metrics::counter!(name, "mode" => mode).increment(count);
}

/// Increment a counter labelled with the extraction mode and a series id.
#[inline]
pub fn increment_series(name: &'static str, mode: &'static str, series: &str, count: u64) {
    metrics::counter!(name, "mode" => mode, "series" => series.to_string()).increment(count);
}

/// Set a gauge labelled with the extraction mode.
#[inline]
pub fn set_gauge(name: &'static str, mode: &'static str, value: f64) {
    metrics::gauge!(name, "mode" => mode).set(value);
}

/// Decrement a gauge labelled with the extraction mode.
#[inline]
pub fn decrement_gauge(name: &'static str, mode: &'static str, value: f64) {
    metrics::gauge!(name, "mode" => mode).decrement(value);
}

/// Record a duration in seconds.
#[inline]
pub fn record_seconds(name: &'static str, mode: &'static str, seconds: f64) {
    metrics::histogram!(name, "mode" => mode).record(seconds);
}
