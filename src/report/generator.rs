//! Summary file generation.
//!
//! This module serializes the issue matrix as CSV (the spreadsheet the
//! audit team opens), JSON, or a Markdown table.

use crate::analysis::{issues_per_host, most_widespread_issues};
use crate::cli::OutputFormat;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{DeviceIdentity, IssueMatrix, IssueMetadata};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for a run's summary: `scan_summary_{YYYYmmdd_HHMMSS}.{ext}`.
pub fn summary_file_name(generated_at: &DateTime<Local>, format: OutputFormat) -> String {
    format!(
        "scan_summary_{}.{}",
        generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write the matrix to a new timestamped file in `output_dir`.
///
/// Refuses to export an empty matrix and never overwrites an existing file.
pub fn export_matrix(
    matrix: &IssueMatrix,
    format: OutputFormat,
    output_dir: &Path,
    generated_at: &DateTime<Local>,
) -> PipelineResult<PathBuf> {
    if matrix.is_empty() {
        return Err(PipelineError::Export("nothing to export".to_string()));
    }

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(summary_file_name(generated_at, format));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| PipelineError::Export(format!("cannot create {}: {}", path.display(), e)))?;

    match format {
        OutputFormat::Csv => write_csv(&mut file, matrix)?,
        OutputFormat::Json => {
            let json = generate_json_report(matrix, generated_at)?;
            file.write_all(json.as_bytes())?;
        }
        OutputFormat::Markdown => {
            let markdown = generate_markdown_report(matrix, generated_at);
            file.write_all(markdown.as_bytes())?;
        }
    }

    info!(
        "Summary with {} issue(s) across {} host(s) saved to {}",
        matrix.rows.len(),
        matrix.hosts.len(),
        path.display()
    );
    Ok(path)
}

/// Write the matrix as CSV: header, then one record per issue.
pub fn write_csv<W: Write>(out: W, matrix: &IssueMatrix) -> PipelineResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(out);
    wtr.write_record(matrix.columns())?;

    for row in &matrix.rows {
        wtr.write_record(row.cells())?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct MatrixDocument<'a> {
    generated_at: String,
    columns: Vec<String>,
    hosts: &'a [DeviceIdentity],
    rows: Vec<MatrixRow<'a>>,
}

#[derive(Serialize)]
struct MatrixRow<'a> {
    issue: &'a str,
    incidence: BTreeMap<&'a str, u8>,
    #[serde(flatten)]
    metadata: &'a IssueMetadata,
}

/// Generate a JSON document with per-host incidence keyed by host.
pub fn generate_json_report(
    matrix: &IssueMatrix,
    generated_at: &DateTime<Local>,
) -> PipelineResult<String> {
    let rows = matrix
        .rows
        .iter()
        .map(|row| MatrixRow {
            issue: &row.issue,
            incidence: matrix
                .hosts
                .iter()
                .zip(&row.incidence)
                .map(|(host, &hit)| (host.as_str(), u8::from(hit)))
                .collect(),
            metadata: &row.metadata,
        })
        .collect();

    let document = MatrixDocument {
        generated_at: generated_at.to_rfc3339(),
        columns: matrix.columns(),
        hosts: &matrix.hosts,
        rows,
    };

    serde_json::to_string_pretty(&document).map_err(Into::into)
}

/// Generate a Markdown summary with the full matrix table.
pub fn generate_markdown_report(matrix: &IssueMatrix, generated_at: &DateTime<Local>) -> String {
    let mut output = String::new();

    output.push_str("# Security Audit Summary\n\n");
    output.push_str(&format!(
        "- **Generated:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    output.push_str(&format!("- **Hosts:** {}\n", matrix.hosts.len()));
    output.push_str(&format!("- **Distinct Issues:** {}\n\n", matrix.rows.len()));

    output.push_str(&generate_overview_section(matrix));
    output.push_str(&generate_matrix_section(matrix));

    output
}

fn generate_overview_section(matrix: &IssueMatrix) -> String {
    let mut section = String::new();

    let widespread = most_widespread_issues(matrix, 5);
    if !widespread.is_empty() {
        section.push_str("## Most Widespread Issues\n\n");
        section.push_str("| Issue | Hosts |\n");
        section.push_str("|:---|:---:|\n");
        for (row, count) in widespread {
            section.push_str(&format!("| {} | {} |\n", escape_cell(&row.issue), count));
        }
        section.push('\n');
    }

    let per_host = issues_per_host(matrix);
    if !per_host.is_empty() {
        section.push_str("## Issues per Host\n\n");
        section.push_str("| Host | Issues |\n");
        section.push_str("|:---|:---:|\n");
        for (host, count) in per_host {
            section.push_str(&format!("| `{}` | {} |\n", host, count));
        }
        section.push('\n');
    }

    section
}

fn generate_matrix_section(matrix: &IssueMatrix) -> String {
    let mut section = String::new();
    let columns = matrix.columns();

    section.push_str("## Issue Matrix\n\n");
    section.push_str(&format!(
        "| {} |\n",
        columns.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(" | ")
    ));
    section.push_str(&format!("|{}\n", ":---|".repeat(columns.len())));

    for row in &matrix.rows {
        let cells: Vec<String> = row.cells().iter().map(|c| escape_cell(c)).collect();
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
