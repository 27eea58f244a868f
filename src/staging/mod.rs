//! Per-run scratch area.
//!
//! Selected configuration files are copied into `staging/` and the
//! scanner writes its documents into `reports/`. The workspace lives in a
//! temporary directory unless a parent work directory is configured.

use crate::error::{PipelineError, PipelineResult};
use crate::models::SourceFile;
use crate::progress::step_bar;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const STAGING_DIR: &str = "staging";
const REPORTS_DIR: &str = "reports";

/// Scratch directories for one run.
pub struct Workspace {
    root: PathBuf,
    staging: PathBuf,
    reports: PathBuf,
    /// Keeps a temporary root alive; `None` when under a configured work dir.
    temp_dir: Option<TempDir>,
}

impl Workspace {
    /// Create the workspace, either under `work_dir/run_{run_id}` or in a
    /// fresh temporary directory.
    ///
    /// An existing run directory is never reused; its reports would be
    /// aggregated as if this run produced them.
    pub fn create(work_dir: Option<&Path>, run_id: &str) -> PipelineResult<Self> {
        let (root, temp_dir) = match work_dir {
            Some(parent) => {
                let root = parent.join(format!("run_{}", run_id));
                fs::create_dir_all(parent).map_err(|e| {
                    PipelineError::staging(format!("create {}", parent.display()), e)
                })?;
                fs::create_dir(&root).map_err(|e| {
                    PipelineError::staging(format!("create run directory {}", root.display()), e)
                })?;
                (root, None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("auditmatrix-")
                    .tempdir()
                    .map_err(|e| PipelineError::staging("create temporary workspace", e))?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let staging = root.join(STAGING_DIR);
        let reports = root.join(REPORTS_DIR);
        for dir in [&staging, &reports] {
            fs::create_dir_all(dir)
                .map_err(|e| PipelineError::staging(format!("create {}", dir.display()), e))?;
        }

        Ok(Self {
            root,
            staging,
            reports,
            temp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports
    }

    /// Copy every source file into the staging directory.
    ///
    /// Any copy failure aborts the run; later steps have no defined input
    /// without a complete staging set.
    pub fn stage(&self, files: &[SourceFile], show_progress: bool) -> PipelineResult<usize> {
        info!("Copying {} config file(s)...", files.len());
        let pb = step_bar(files.len(), "Copying configs", show_progress);

        for file in files {
            let name = file.path.file_name().ok_or_else(|| {
                PipelineError::staging(
                    format!("copy {}", file.path.display()),
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
            let target = self.staging.join(name);
            if target.exists() {
                debug!(
                    "Staged name {} already taken, overwriting with {}",
                    target.display(),
                    file.path.display()
                );
            }

            fs::copy(&file.path, &target).map_err(|e| {
                PipelineError::staging(format!("copy {}", file.path.display()), e)
            })?;
            pb.inc(1);
        }

        pb.finish_with_message("Copied configs");
        info!("Successfully copied {} file(s)", files.len());
        Ok(files.len())
    }

    /// Tear down or keep the workspace. Returns the path when kept.
    pub fn finish(self, cleanup: bool) -> Option<PathBuf> {
        if cleanup {
            match self.temp_dir {
                Some(temp) => {
                    debug!("Cleaning up temporary workspace: {}", temp.path().display());
                    if let Err(e) = temp.close() {
                        warn!("Failed to remove workspace {}: {}", self.root.display(), e);
                    }
                }
                None => {
                    debug!("Removing run directory: {}", self.root.display());
                    if let Err(e) = fs::remove_dir_all(&self.root) {
                        warn!("Failed to remove workspace {}: {}", self.root.display(), e);
                    }
                }
            }
            None
        } else {
            if let Some(temp) = self.temp_dir {
                let _ = temp.keep();
            }
            info!("Workspace kept at: {}", self.root.display());
            Some(self.root)
        }
    }
}
