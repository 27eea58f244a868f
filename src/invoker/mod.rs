//! External scanner invocation.
//!
//! The scanner is an opaque command that turns one device configuration
//! into one HTML report. A failed invocation only means that device gets
//! no report; it never stops the batch.

use crate::config::ScannerConfig;
use crate::models::DeviceIdentity;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Result of scanning one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scanner exited successfully and wrote the report.
    Produced(PathBuf),
    /// No report for this device.
    Skipped { reason: String },
}

impl ScanOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self, ScanOutcome::Produced(_))
    }
}

/// Produces a report document for one normalized input.
pub trait ScanInvoker {
    fn invoke(&self, input: &Path, output: &Path) -> ScanOutcome;
}

/// Runs the configured scanner binary with
/// `--input=<path> --output=<path> <device flag>`.
#[derive(Debug, Clone)]
pub struct ExternalScanner {
    executable: PathBuf,
    device_type: String,
}

impl ExternalScanner {
    pub fn new(executable: PathBuf, device_type: impl Into<String>) -> Self {
        Self {
            executable,
            device_type: device_type.into(),
        }
    }

    /// Arguments passed to the scanner for one input.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            format!("--input={}", input.display()),
            format!("--output={}", output.display()),
            self.device_type.clone(),
        ]
    }
}

impl From<&ScannerConfig> for ExternalScanner {
    fn from(config: &ScannerConfig) -> Self {
        Self::new(config.executable.clone(), config.device_type.clone())
    }
}

impl ScanInvoker for ExternalScanner {
    fn invoke(&self, input: &Path, output: &Path) -> ScanOutcome {
        let args = self.args(input, output);
        debug!("Running {} {}", self.executable.display(), args.join(" "));

        let status = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => {
                if output.is_file() {
                    ScanOutcome::Produced(output.to_path_buf())
                } else {
                    ScanOutcome::skipped("scanner exited successfully but wrote no report")
                }
            }
            Ok(s) => ScanOutcome::skipped(format!("scanner exited with {}", s)),
            Err(e) => ScanOutcome::skipped(format!(
                "failed to start {}: {}",
                self.executable.display(),
                e
            )),
        }
    }
}

/// Report path for an identity: `{reports_dir}/{identity}_report.{ext}`.
pub fn report_path(reports_dir: &Path, identity: &DeviceIdentity, ext: &str) -> PathBuf {
    reports_dir.join(format!("{}_report.{}", identity, ext))
}

/// Invoke the scanner for one device and log a skip.
pub fn scan_device(
    invoker: &dyn ScanInvoker,
    identity: &DeviceIdentity,
    input: &Path,
    output: &Path,
) -> ScanOutcome {
    let outcome = invoker.invoke(input, output);
    if let ScanOutcome::Skipped { ref reason } = outcome {
        error!(
            "Scanner error for {} ({}): {}",
            identity,
            input.display(),
            reason
        );
    }
    outcome
}
