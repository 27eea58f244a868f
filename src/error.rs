//! Error types for the aggregation pipeline.
//!
//! Fatal failures halt the run and surface as [`PipelineError`].
//! Per-item failures never use these types; they are reported as
//! [`ScanOutcome::Skipped`](crate::invoker::ScanOutcome) or as an empty
//! recommendation list and the batch keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid selection policy '{0}' (expected LatestFolder, RecentFiles or Both)")]
    InvalidPolicy(String),

    #[error("Invalid column layout '{0}' (expected standard or compact)")]
    InvalidLayout(String),

    #[error("Missing required path: {0}")]
    MissingPath(&'static str),

    #[error("Source directory does not exist: {}", .0.display())]
    SourceDirNotFound(PathBuf),

    #[error("Maximum file age must be at least 1 day")]
    InvalidMaxAge,

    #[error("Scanner executable not found: {}", .0.display())]
    ScannerNotFound(PathBuf),

    #[error("Scanner device type flag must not be empty")]
    EmptyDeviceType,

    #[error("{0}")]
    Invalid(String),
}

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("No source files matched under {}", .0.display())]
    NoSources(PathBuf),

    #[error("Staging error: {context}: {source}")]
    Staging {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Normalization error: {context}: {source}")]
    Normalize {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn staging(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Staging {
            context: context.into(),
            source,
        }
    }

    pub fn normalize(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Normalize {
            context: context.into(),
            source,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
