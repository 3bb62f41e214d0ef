//! Typed extractor configuration.
//!
//! The binary builds an [`IngestConfig`] from its command-line arguments and
//! validates it before anything touches the network.

use crate::lifecycle::LifecyclePolicy;
use crate::orchestrator::OrchestratorConfig;
use crate::scheduler::{Mode, ScanWindow, SchedulerConfig};
use crate::{Error, Result};
use sluice_core::BATCH_MAX;
use std::path::PathBuf;
use std::time::Duration;

/// Extractor configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Folder the producer drops files into.
    pub input: PathBuf,

    pub mode: Mode,

    /// Bounds on which files are picked up.
    pub window: ScanWindow,

    /// Move failed files into `<input>/failed`.
    pub move_failed: bool,

    /// Move processed files into `<input>/finished` instead of deleting them.
    pub move_finished: bool,

    /// Leave processed files in place.
    pub keep_processed: bool,

    /// Files processed at the same time.
    pub concurrency: usize,

    /// Live-mode cap on files per cycle.
    pub max_files_per_cycle: usize,

    /// Pause between live cycles.
    pub cycle_delay: Duration,

    /// Minimum file age before a file is picked up.
    pub quiescence: Duration,

    /// Series entries per write request.
    pub max_batch_series: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            mode: Mode::Live,
            window: ScanWindow::default(),
            move_failed: false,
            move_finished: false,
            keep_processed: false,
            concurrency: 10,
            max_files_per_cycle: 20,
            cycle_delay: Duration::from_secs(8),
            quiescence: Duration::from_secs(2),
            max_batch_series: BATCH_MAX,
        }
    }
}

impl IngestConfig {
    /// Check the configuration for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.input.is_dir() {
            return Err(Error::Config(format!(
                "input folder {} does not exist",
                self.input.display()
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.max_files_per_cycle == 0 {
            return Err(Error::Config(
                "max files per cycle must be at least 1".to_string(),
            ));
        }
        if !(1..=BATCH_MAX).contains(&self.max_batch_series) {
            return Err(Error::Config(format!(
                "batch size must be between 1 and {BATCH_MAX}"
            )));
        }
        if let (Some(since), Some(until)) = (self.window.since, self.window.until) {
            if since >= until {
                return Err(Error::Config(format!(
                    "--since ({since}) must be before --until ({until})"
                )));
            }
        }
        Ok(())
    }

    pub fn lifecycle(&self) -> LifecyclePolicy {
        LifecyclePolicy::from_flags(
            &self.input,
            self.move_failed,
            self.move_finished,
            self.keep_processed,
        )
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            folder: self.input.clone(),
            mode: self.mode,
            quiescence: self.quiescence,
            max_files_per_cycle: self.max_files_per_cycle,
            ..Default::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency: self.concurrency,
            max_batch_series: self.max_batch_series,
            lifecycle: self.lifecycle(),
            mode: self.mode,
        }
    }
}
