//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// AuditMatrix - batch network-device config audits into one spreadsheet
///
/// Picks device configuration files from a share, runs the configuration
/// scanner on each one and merges every report's recommendations table
/// into a single issue-by-host matrix.
///
/// Examples:
///   auditmatrix --source-dir /mnt/share/configs
///   auditmatrix --source-dir ./configs --policy both --max-age-days 3
///   auditmatrix --from-reports ./reports --format json
///   auditmatrix --source-dir ./configs --dry-run
///   auditmatrix --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Root directory holding dated subfolders or loose config files
    #[arg(short, long, value_name = "DIR", env = "AUDITMATRIX_SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory where the summary file is written
    #[arg(short, long, value_name = "DIR", env = "AUDITMATRIX_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Parent directory for the per-run scratch area
    ///
    /// A temporary directory is used when not set.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Directory for plain-text run logs
    #[arg(long, value_name = "DIR", env = "AUDITMATRIX_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Source selection policy
    ///
    /// Values: LatestFolder, RecentFiles, Both (kebab-case accepted).
    #[arg(short, long, value_name = "POLICY")]
    pub policy: Option<String>,

    /// Maximum age in days for the RecentFiles policy
    #[arg(long, value_name = "DAYS")]
    pub max_age_days: Option<u64>,

    /// Extension of device configuration files
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Path to the scanner executable
    #[arg(long, value_name = "FILE", env = "AUDITMATRIX_SCANNER")]
    pub scanner: Option<PathBuf>,

    /// Device-type flag passed to the scanner (e.g. --procurve)
    #[arg(long, value_name = "FLAG", allow_hyphen_values = true)]
    pub device_type: Option<String>,

    /// Output format (csv, json, markdown)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Recommendations table layout (standard, compact)
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .auditmatrix.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep the scratch area (staged configs and reports) after the run
    #[arg(long)]
    pub keep_workspace: bool,

    /// Aggregate existing report documents from DIR instead of scanning
    #[arg(long, value_name = "DIR", conflicts_with = "dry_run")]
    pub from_reports: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the files the selection policy picks and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .auditmatrix.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// JSON document
    Json,
    /// Markdown table
    Markdown,
}

impl OutputFormat {
    /// File extension used for the summary file.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(days) = self.max_age_days {
            if days == 0 {
                return Err("Max age must be at least 1 day".to_string());
            }
        }

        if let Some(ref reports) = self.from_reports {
            if !reports.is_dir() {
                return Err(format!(
                    "Reports directory does not exist: {}",
                    reports.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
