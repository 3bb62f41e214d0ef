//! What happens to a file once it has been processed.

use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Action for a file that was fully posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessAction {
    Delete,
    /// Move into this folder, created on demand.
    MoveTo(PathBuf),
    Keep,
}

/// Action for a file that could not be parsed or posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// Move into this folder, created on demand.
    MoveTo(PathBuf),
    /// Leave the file where it is; live mode will pick it up again.
    LeaveInPlace,
}

/// Where a file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Deleted,
    Moved(PathBuf),
    Kept,
    LeftInPlace,
}

/// Terminal file actions for both outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub on_success: SuccessAction,
    pub on_failure: FailureAction,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            on_success: SuccessAction::Delete,
            on_failure: FailureAction::LeaveInPlace,
        }
    }
}

impl LifecyclePolicy {
    /// Build the policy from the input folder and the archival flags.
    ///
    /// `move_finished` takes precedence over `keep_processed`.
    pub fn from_flags(
        input: &Path,
        move_failed: bool,
        move_finished: bool,
        keep_processed: bool,
    ) -> Self {
        let on_success = if move_finished {
            SuccessAction::MoveTo(input.join("finished"))
        } else if keep_processed {
            SuccessAction::Keep
        } else {
            SuccessAction::Delete
        };
        let on_failure = if move_failed {
            FailureAction::MoveTo(input.join("failed"))
        } else {
            FailureAction::LeaveInPlace
        };
        Self {
            on_success,
            on_failure,
        }
    }

    /// Apply the success action to `path`.
    pub async fn settle_success(&self, path: &Path) -> Result<Disposition> {
        match &self.on_success {
            SuccessAction::Delete => {
                fs::remove_file(path).await.map_err(|e| archival(path, e))?;
                Ok(Disposition::Deleted)
            }
            SuccessAction::MoveTo(folder) => move_into(path, folder).await.map(Disposition::Moved),
            SuccessAction::Keep => Ok(Disposition::Kept),
        }
    }

    /// Apply the failure action to `path`.
    pub async fn settle_failure(&self, path: &Path) -> Result<Disposition> {
        match &self.on_failure {
            FailureAction::MoveTo(folder) => move_into(path, folder).await.map(Disposition::Moved),
            FailureAction::LeaveInPlace => Ok(Disposition::LeftInPlace),
        }
    }
}

async fn move_into(path: &Path, folder: &Path) -> Result<PathBuf> {
    fs::create_dir_all(folder)
        .await
        .map_err(|e| archival(path, e))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| archival(path, io::Error::other("path has no file name")))?;
    let target = folder.join(file_name);
    fs::rename(path, &target)
        .await
        .map_err(|e| archival(path, e))?;
    Ok(target)
}

fn archival(path: &Path, source: io::Error) -> Error {
    Error::Archival {
        path: path.to_path_buf(),
        source,
    }
}
