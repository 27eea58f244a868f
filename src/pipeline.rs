//! End-to-end run: select, stage, normalize, scan, extract, aggregate,
//! export.
//!
//! Every step runs sequentially. Selection, staging and renaming failures
//! abort the run; a failed scan or an unreadable report only drops that
//! device from the summary.

use crate::analysis::build_matrix;
use crate::config::Config;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::extract::load_host_reports;
use crate::identity::normalize_staged;
use crate::invoker::{report_path, scan_device, ScanInvoker};
use crate::models::{HostReport, IssueMatrix, SourceFile};
use crate::progress::step_bar;
use crate::report::export_matrix;
use crate::selector::SourceSelector;
use crate::staging::Workspace;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

/// Counters and artifacts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub staged: usize,
    pub devices: usize,
    pub scanned: usize,
    pub skipped: usize,
    pub reports: usize,
    pub hosts: usize,
    pub issues: usize,
    /// Exported summary file; `None` when there was nothing to export.
    pub output: Option<PathBuf>,
    /// Scratch area, when kept after the run.
    pub workspace: Option<PathBuf>,
}

/// Runs the aggregation pipeline with an explicit configuration.
pub struct Pipeline<'a> {
    config: &'a Config,
    invoker: &'a dyn ScanInvoker,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, invoker: &'a dyn ScanInvoker) -> Self {
        Self {
            config,
            invoker,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the full pipeline, stamping the output with `started_at`.
    pub fn run(&self, started_at: DateTime<Local>) -> PipelineResult<RunSummary> {
        self.config.validate()?;
        let source_dir = self
            .config
            .paths
            .source_dir
            .clone()
            .ok_or(ConfigError::MissingPath("paths.source_dir"))?;

        // Step 1: Select sources
        let selector = SourceSelector::from_config(source_dir.clone(), &self.config.selection);
        let sources = selector.select(self.config.selection.policy);
        if sources.is_empty() {
            return Err(PipelineError::NoSources(source_dir));
        }

        let mut summary = RunSummary {
            selected: sources.len(),
            ..RunSummary::default()
        };

        // Step 2: Stage copies in a scratch area
        let run_id = started_at.format("%Y%m%d_%H%M%S").to_string();
        let workspace = Workspace::create(self.config.paths.work_dir.as_deref(), &run_id)?;
        info!("Run workspace: {}", workspace.root().display());
        let result = self.process(&workspace, &started_at, &sources, &mut summary);

        summary.workspace = workspace.finish(self.config.report.cleanup);
        result.map(|_| summary)
    }

    fn process(
        &self,
        workspace: &Workspace,
        started_at: &DateTime<Local>,
        sources: &[SourceFile],
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        let scanner = &self.config.scanner;

        summary.staged = workspace.stage(sources, self.show_progress)?;

        // Step 3: Normalize identities
        let inputs = normalize_staged(
            workspace.staging_dir(),
            &self.config.selection.extension,
            &scanner.staged_extension,
            self.show_progress,
        )?;
        summary.devices = inputs.len();

        // Step 4: Scan each device
        info!("Processing {} file(s) with the scanner...", inputs.len());
        let pb = step_bar(inputs.len(), "Running scanner", self.show_progress);
        for input in &inputs {
            let output = report_path(
                workspace.reports_dir(),
                &input.identity,
                &scanner.report_extension,
            );
            if scan_device(self.invoker, &input.identity, &input.path, &output).is_produced() {
                summary.scanned += 1;
            } else {
                summary.skipped += 1;
            }
            pb.inc(1);
        }
        pb.finish_with_message("Scanner done");
        info!(
            "Scanner produced {} report(s), skipped {}",
            summary.scanned, summary.skipped
        );

        // Step 5: Extract and aggregate
        let reports = load_host_reports(
            workspace.reports_dir(),
            &scanner.report_extension,
            self.config.report.column_layout,
        )?;
        self.aggregate_and_export(&reports, started_at, summary)
    }

    /// Merge host reports and write the summary unless it is empty.
    fn aggregate_and_export(
        &self,
        reports: &[HostReport],
        started_at: &DateTime<Local>,
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        let matrix = build_matrix(reports);
        record_matrix(summary, reports, &matrix);

        if matrix.is_empty() {
            info!("No data for the report, nothing to export");
            return Ok(());
        }

        let path = export_matrix(
            &matrix,
            self.config.report.format,
            &self.config.paths.output_dir,
            started_at,
        )?;
        summary.output = Some(path);
        Ok(())
    }

    /// Aggregate already-produced report documents without scanning.
    pub fn run_from_reports(
        &self,
        reports_dir: &Path,
        started_at: DateTime<Local>,
    ) -> PipelineResult<RunSummary> {
        let reports = load_host_reports(
            reports_dir,
            &self.config.scanner.report_extension,
            self.config.report.column_layout,
        )?;

        let mut summary = RunSummary::default();
        self.aggregate_and_export(&reports, &started_at, &mut summary)?;
        Ok(summary)
    }
}

fn record_matrix(summary: &mut RunSummary, reports: &[HostReport], matrix: &IssueMatrix) {
    summary.reports = reports.len();
    summary.hosts = matrix.hosts.len();
    summary.issues = matrix.rows.len();
}
