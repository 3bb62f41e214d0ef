//! Discovery and ordering of input files.
//!
//! Each cycle lists the input folder (non-recursive), drops files that may
//! still be being written, applies the scan window and orders the rest:
//!
//! | Mode       | Order                 | Cap                   |
//! |------------|-----------------------|-----------------------|
//! | Live       | newest first by mtime | `max_files_per_cycle` |
//! | Historical | oldest first by mtime | none                  |
//!
//! Files that succeeded but were kept in place are remembered in
//! [`SettledFiles`] and skipped before the cap is applied, so they neither
//! repost nor crowd newer files out of a live cycle.

use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Extraction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Poll the folder forever.
    Live,
    /// Drain the folder once, then stop.
    Historical,
}

impl Mode {
    /// Label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Historical => "historical",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file selected for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    /// Timestamp encoded in the file name (`<prefix>_<unix seconds>.csv`).
    pub embedded_timestamp: Option<DateTime<Utc>>,
}

/// Bounds on which files a scan returns.
///
/// `since` is an exclusive lower bound on modification time. `until` drops
/// files whose embedded name timestamp is at or after it; files without an
/// embedded timestamp are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ScanWindow {
    fn admits(&self, modified: DateTime<Utc>, embedded: Option<DateTime<Utc>>) -> bool {
        if self.since.is_some_and(|since| modified <= since) {
            return false;
        }
        match (self.until, embedded) {
            (Some(until), Some(stamp)) => stamp < until,
            _ => true,
        }
    }
}

/// Files that were processed successfully but are still in the input folder.
///
/// An entry matches only while the file keeps the modification time it had
/// when it was processed; a rewritten file is picked up again.
#[derive(Debug, Clone, Default)]
pub struct SettledFiles {
    files: HashMap<PathBuf, DateTime<Utc>>,
}

impl SettledFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: &FileTask) {
        self.files.insert(task.path.clone(), task.modified);
    }

    pub fn contains(&self, path: &Path, modified: DateTime<Utc>) -> bool {
        self.files.get(path) == Some(&modified)
    }

    /// Forget files that are no longer on disk.
    pub fn prune(&mut self) {
        self.files.retain(|path, _| path.exists());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub folder: PathBuf,
    pub mode: Mode,
    /// File extension to pick up, compared case-insensitively.
    pub extension: String,
    /// Minimum age of a file before it is considered complete.
    pub quiescence: Duration,
    /// Live-mode cap on files per cycle.
    pub max_files_per_cycle: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            mode: Mode::Live,
            extension: "csv".to_string(),
            quiescence: Duration::from_secs(2),
            max_files_per_cycle: 20,
        }
    }
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Files to process this cycle, in processing order.
    pub tasks: Vec<FileTask>,
    /// Eligible files before the live-mode cap.
    pub total_eligible: usize,
}

/// Lists and orders eligible files.
#[derive(Debug, Clone)]
pub struct FileScheduler {
    config: SchedulerConfig,
}

impl FileScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// List the files to process at `now`.
    ///
    /// Files in `settled` are skipped. Problems with single entries are
    /// skipped too; only failing to read the folder itself is an error.
    pub fn list_eligible(
        &self,
        now: DateTime<Utc>,
        window: ScanWindow,
        settled: &SettledFiles,
    ) -> Result<ScanResult> {
        let folder = &self.config.folder;
        let entries = fs::read_dir(folder).map_err(|source| Error::Discovery {
            path: folder.clone(),
            source,
        })?;

        let quiescence = TimeDelta::from_std(self.config.quiescence).unwrap_or(TimeDelta::MAX);
        let mut tasks = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", folder.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !self.has_extension(&path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let modified: DateTime<Utc> = match metadata.modified() {
                Ok(t) => t.into(),
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            // Young files may still be being written by the producer.
            if now.signed_duration_since(modified) < quiescence {
                continue;
            }
            if settled.contains(&path, modified) {
                continue;
            }

            let embedded_timestamp = embedded_timestamp(&path);
            if !window.admits(modified, embedded_timestamp) {
                continue;
            }

            tasks.push(FileTask {
                path,
                modified,
                embedded_timestamp,
            });
        }

        let total_eligible = tasks.len();
        match self.config.mode {
            Mode::Live => {
                tasks.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
                tasks.truncate(self.config.max_files_per_cycle);
            }
            Mode::Historical => {
                tasks.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
            }
        }

        debug!(
            "Discovered {} eligible files in {}, scheduling {}",
            total_eligible,
            folder.display(),
            tasks.len()
        );

        Ok(ScanResult {
            tasks,
            total_eligible,
        })
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.config.extension))
    }
}

/// Parse the `_<unix seconds>` suffix of a file stem.
pub fn embedded_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_str()?;
    let (_, digits) = stem.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    DateTime::from_timestamp(digits.parse().ok()?, 0)
}
