//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration from
//! `.auditmatrix.toml` files. The resulting [`Config`] is passed explicitly
//! to every pipeline stage.

use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use crate::extract::ColumnLayout;
use crate::selector::SelectionPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".auditmatrix.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory settings.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Source selection settings.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// External scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root holding dated subfolders or loose config files.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Parent of the per-run scratch area. A temporary directory is used
    /// when unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Where the summary file is written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Optional directory for plain-text run logs.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            work_dir: None,
            output_dir: default_output_dir(),
            log_dir: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Source file selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Which files feed the run.
    #[serde(default)]
    pub policy: SelectionPolicy,

    /// Age threshold for the `RecentFiles` policy.
    #[serde(default = "default_max_file_age_days")]
    pub max_file_age_days: u64,

    /// Extension of device configuration files (without dot).
    #[serde(default = "default_source_extension")]
    pub extension: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::default(),
            max_file_age_days: default_max_file_age_days(),
            extension: default_source_extension(),
        }
    }
}

fn default_max_file_age_days() -> u64 {
    7
}

fn default_source_extension() -> String {
    "cfg".to_string()
}

/// External scanner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Path to the scanner binary.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Device-type selector flag passed verbatim (e.g. `--procurve`).
    #[serde(default = "default_device_type")]
    pub device_type: String,

    /// Extension given to normalized inputs.
    #[serde(default = "default_staged_extension")]
    pub staged_extension: String,

    /// Extension of report documents produced by the scanner.
    #[serde(default = "default_report_extension")]
    pub report_extension: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            device_type: default_device_type(),
            staged_extension: default_staged_extension(),
            report_extension: default_report_extension(),
        }
    }
}

fn default_executable() -> PathBuf {
    PathBuf::from("nipper")
}

fn default_device_type() -> String {
    "--procurve".to_string()
}

fn default_staged_extension() -> String {
    "txt".to_string()
}

fn default_report_extension() -> String {
    "html".to_string()
}

/// Summary output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Column offsets of the report's recommendations table.
    #[serde(default)]
    pub column_layout: ColumnLayout,

    /// Remove the run's scratch area when the run finishes.
    #[serde(default = "default_true")]
    pub cleanup: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            column_layout: ColumnLayout::default(),
            cleanup: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings and only
    /// override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(ref source) = args.source_dir {
            self.paths.source_dir = Some(source.clone());
        }
        if let Some(ref work) = args.work_dir {
            self.paths.work_dir = Some(work.clone());
        }
        if let Some(ref output) = args.output_dir {
            self.paths.output_dir = output.clone();
        }
        if let Some(ref logs) = args.log_dir {
            self.paths.log_dir = Some(logs.clone());
        }

        if let Some(ref policy) = args.policy {
            self.selection.policy = policy.parse()?;
        }
        if let Some(days) = args.max_age_days {
            self.selection.max_file_age_days = days;
        }
        if let Some(ref ext) = args.extension {
            self.selection.extension = ext.trim_start_matches('.').to_string();
        }

        if let Some(ref scanner) = args.scanner {
            self.scanner.executable = scanner.clone();
        }
        if let Some(ref device) = args.device_type {
            self.scanner.device_type = device.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref layout) = args.layout {
            self.report.column_layout = layout.parse()?;
        }
        if args.keep_workspace {
            self.report.cleanup = false;
        }

        Ok(())
    }

    /// Check the settings needed for a full scan run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = self
            .paths
            .source_dir
            .as_ref()
            .ok_or(ConfigError::MissingPath("paths.source_dir"))?;

        if !source.is_dir() {
            return Err(ConfigError::SourceDirNotFound(source.clone()));
        }

        if self.selection.max_file_age_days == 0 {
            return Err(ConfigError::InvalidMaxAge);
        }

        if self.selection.extension.is_empty() {
            return Err(ConfigError::Invalid(
                "Source file extension must not be empty".to_string(),
            ));
        }

        let executable = &self.scanner.executable;
        if executable.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath("scanner.executable"));
        }
        // Bare names are resolved through PATH at invocation time
        if executable.components().count() > 1 && !executable.is_file() {
            return Err(ConfigError::ScannerNotFound(executable.clone()));
        }

        if self.scanner.device_type.trim().is_empty() {
            return Err(ConfigError::EmptyDeviceType);
        }

        if self.scanner.staged_extension.eq_ignore_ascii_case(&self.selection.extension) {
            return Err(ConfigError::Invalid(format!(
                "Staged extension '{}' must differ from the source extension",
                self.scanner.staged_extension
            )));
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.paths.source_dir = Some(PathBuf::from("./configs"));
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
