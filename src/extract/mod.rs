//! Recommendation extraction from scanner HTML reports.
//!
//! Reports carry a "Security Audit" chapter with a "Recommendations"
//! heading followed by a findings table. The section is located by heading
//! text rather than position so template changes around it do not matter.

use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::models::{DeviceIdentity, HostReport, Recommendation};
use anyhow::{Context, Result};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

const SECTION_HEADING: &str = "Security Audit";
const RECOMMENDATIONS_HEADING: &str = "Recommendations";

/// Rows with fewer cells than this are not findings.
pub const MIN_RECOMMENDATION_CELLS: usize = 7;

/// Cell index of each recommendation field within a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOffsets {
    pub issue: usize,
    pub overall: usize,
    pub impact: usize,
    pub ease: usize,
    pub fix: usize,
    pub recommendation: usize,
}

/// Offsets for reports that carry an extra column after the issue title.
pub const STANDARD_OFFSETS: ColumnOffsets = ColumnOffsets {
    issue: 0,
    overall: 2,
    impact: 3,
    ease: 4,
    fix: 5,
    recommendation: 6,
};

/// Offsets for reports with the fields packed right after the issue title.
pub const COMPACT_OFFSETS: ColumnOffsets = ColumnOffsets {
    issue: 0,
    overall: 1,
    impact: 2,
    ease: 3,
    fix: 4,
    recommendation: 5,
};

/// Report template revision, selecting the column offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnLayout {
    #[default]
    Standard,
    Compact,
}

impl ColumnLayout {
    pub const fn offsets(self) -> ColumnOffsets {
        match self {
            ColumnLayout::Standard => STANDARD_OFFSETS,
            ColumnLayout::Compact => COMPACT_OFFSETS,
        }
    }
}

impl FromStr for ColumnLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(ColumnLayout::Standard),
            "compact" => Ok(ColumnLayout::Compact),
            _ => Err(ConfigError::InvalidLayout(s.to_string())),
        }
    }
}

/// Extract recommendation records from a report's HTML.
///
/// Returns an empty list when the recommendations section or its table is
/// missing.
pub fn parse_recommendations(html: &str, layout: ColumnLayout) -> Vec<Recommendation> {
    let document = Html::parse_document(html);
    let Some(table) = find_recommendations_table(&document) else {
        return Vec::new();
    };

    let offsets = layout.offsets();
    descendants_named(table, "tr")
        .skip(1)
        .filter_map(move |row| {
            let cells: Vec<String> = descendants_named(row, "td").map(cell_text).collect();
            if cells.len() < MIN_RECOMMENDATION_CELLS {
                return None;
            }
            Some(Recommendation {
                issue: cells[offsets.issue].clone(),
                overall: cells[offsets.overall].clone(),
                impact: cells[offsets.impact].clone(),
                ease: cells[offsets.ease].clone(),
                fix: cells[offsets.fix].clone(),
                recommendation: cells[offsets.recommendation].clone(),
            })
        })
        .collect()
}

/// First table after the first "Recommendations" heading whose nearest
/// preceding `h2` mentions "Security Audit".
fn find_recommendations_table(document: &Html) -> Option<ElementRef<'_>> {
    let mut last_h2: Option<String> = None;
    let mut anchored = false;

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        let name = element.value().name();

        if anchored {
            if name == "table" {
                return Some(element);
            }
            continue;
        }

        if is_heading(name)
            && cell_text(element).contains(RECOMMENDATIONS_HEADING)
            && last_h2
                .as_deref()
                .is_some_and(|h2| h2.contains(SECTION_HEADING))
        {
            anchored = true;
            continue;
        }

        if name == "h2" {
            last_h2 = Some(cell_text(element));
        }
    }

    None
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn descendants_named<'a>(
    element: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

/// Element text with whitespace runs collapsed and ends trimmed.
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read and parse one report. Failures are logged and yield no records.
pub fn extract_file(path: &Path, layout: ColumnLayout) -> Vec<Recommendation> {
    match try_extract_file(path, layout) {
        Ok(recommendations) => {
            debug!(
                "Extracted {} recommendation(s) from {}",
                recommendations.len(),
                path.display()
            );
            recommendations
        }
        Err(e) => {
            warn!("Error: {} - {:#}", path.display(), e);
            Vec::new()
        }
    }
}

fn try_extract_file(path: &Path, layout: ColumnLayout) -> Result<Vec<Recommendation>> {
    let html = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    Ok(parse_recommendations(&html, layout))
}

/// Host identity of a report file: the file name's token before the first `_`.
pub fn host_from_report_name(path: &Path) -> Option<DeviceIdentity> {
    let name = path.file_name()?.to_str()?;
    match name.split('_').next() {
        Some(host) if !host.is_empty() => Some(DeviceIdentity::new(host)),
        _ => None,
    }
}

/// List `.{ext}` report documents in `dir`, sorted by file name.
pub fn discover_reports(dir: &Path, ext: &str) -> PipelineResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        PipelineError::Discovery(format!("cannot read reports in {}: {}", dir.display(), e))
    })?;

    let mut reports: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    reports.sort();
    Ok(reports)
}

/// Extract every report in `dir`, in discovery order.
pub fn load_host_reports(
    dir: &Path,
    ext: &str,
    layout: ColumnLayout,
) -> PipelineResult<Vec<HostReport>> {
    let paths = discover_reports(dir, ext)?;
    info!("Parsing {} report(s) from {}", paths.len(), dir.display());

    Ok(paths
        .iter()
        .filter_map(|path| {
            let Some(host) = host_from_report_name(path) else {
                warn!("Cannot derive a host from {}, skipping", path.display());
                return None;
            };
            Some(HostReport {
                host,
                recommendations: extract_file(path, layout),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER_ROW: &str =
        "<tr><th>Issue</th><th>Ref</th><th>Overall</th><th>Impact</th><th>Ease</th><th>Fix</th><th>Recommendation</th></tr>";

    fn row(issue: &str, impact: &str) -> String {
        format!(
            "<tr><td>{}</td><td>2.1</td><td>High</td><td>{}</td><td>Easy</td><td>Quick</td><td>Fix it\n   now</td></tr>",
            issue, impact
        )
    }

    fn report(rows: &[String]) -> String {
        format!(
            r#"<html><body>
<h1>Nipper Report</h1>
<h2>1. Introduction</h2>
<h3>Recommendations</h3>
<table><tr><td>decoy</td><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td><td>f</td></tr></table>
<h2>2. Security Audit</h2>
<h3>2.1 Findings</h3>
<p>Some text</p>
<h3>2.40 Recommendations</h3>
<p>The table below lists the recommendations.</p>
<table>{}{}</table>
<table><tr><td>after</td></tr></table>
</body></html>"#,
            HEADER_ROW,
            rows.join("")
        )
    }

    #[test]
    fn test_zero_one_many_rows() {
        assert!(parse_recommendations(&report(&[]), ColumnLayout::Standard).is_empty());

        let one = parse_recommendations(&report(&[row("Weak Cipher", "High")]), ColumnLayout::Standard);
        assert_eq!(one.len(), 1);

        let rows: Vec<String> = (0..5).map(|i| row(&format!("Issue {}", i), "Low")).collect();
        let many = parse_recommendations(&report(&rows), ColumnLayout::Standard);
        assert_eq!(many.len(), 5);
        assert_eq!(many[4].issue, "Issue 4");
    }

    #[test]
    fn test_standard_offsets() {
        let recs = parse_recommendations(&report(&[row("Weak Cipher", "Critical")]), ColumnLayout::Standard);
        assert_eq!(
            recs[0],
            Recommendation {
                issue: "Weak Cipher".to_string(),
                overall: "High".to_string(),
                impact: "Critical".to_string(),
                ease: "Easy".to_string(),
                fix: "Quick".to_string(),
                recommendation: "Fix it now".to_string(),
            }
        );
    }

    #[test]
    fn test_compact_offsets() {
        let recs = parse_recommendations(&report(&[row("Weak Cipher", "Critical")]), ColumnLayout::Compact);
        assert_eq!(recs[0].issue, "Weak Cipher");
        assert_eq!(recs[0].overall, "2.1");
        assert_eq!(recs[0].impact, "High");
        assert_eq!(recs[0].ease, "Critical");
        assert_eq!(recs[0].fix, "Easy");
        assert_eq!(recs[0].recommendation, "Quick");
    }

    #[test]
    fn test_layout_offsets_table() {
        assert_eq!(ColumnLayout::Standard.offsets(), STANDARD_OFFSETS);
        assert_eq!(ColumnLayout::Compact.offsets(), COMPACT_OFFSETS);
        for offsets in [STANDARD_OFFSETS, COMPACT_OFFSETS] {
            let max = [
                offsets.issue,
                offsets.overall,
                offsets.impact,
                offsets.ease,
                offsets.fix,
                offsets.recommendation,
            ]
            .into_iter()
            .max()
            .unwrap();
            assert!(max < MIN_RECOMMENDATION_CELLS);
        }
        assert_eq!("Compact".parse::<ColumnLayout>().unwrap(), ColumnLayout::Compact);
        assert!("wide".parse::<ColumnLayout>().is_err());
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let short = "<tr><td>Too</td><td>short</td></tr>".to_string();
        let recs = parse_recommendations(
            &report(&[short, row("Kept", "Low")]),
            ColumnLayout::Standard,
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].issue, "Kept");
    }

    #[test]
    fn test_empty_issue_is_kept() {
        let recs = parse_recommendations(&report(&[row("", "Low")]), ColumnLayout::Standard);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].issue, "");
    }

    #[test]
    fn test_multi_node_cells_join_with_space() {
        let rows = vec![
            row("Weak<br>Cipher", "High"),
            row("Weak<b>Cipher</b>", "High"),
            row("  Weak \n  Cipher ", "High"),
        ];
        let recs = parse_recommendations(&report(&rows), ColumnLayout::Standard);

        assert_eq!(recs.len(), 3);
        for rec in &recs {
            assert_eq!(rec.issue, "Weak Cipher");
        }
    }

    #[test]
    fn test_missing_section() {
        let html = "<html><body><h2>Security Audit</h2><p>No recommendations table</p></body></html>";
        assert!(parse_recommendations(html, ColumnLayout::Standard).is_empty());

        let no_anchor = "<html><body><h2>Configuration</h2><h3>Recommendations</h3><table>\
            <tr><th>h</th></tr><tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td><td>6</td><td>7</td></tr>\
            </table></body></html>";
        assert!(parse_recommendations(no_anchor, ColumnLayout::Standard).is_empty());

        assert!(parse_recommendations("not html at all <<<", ColumnLayout::Standard).is_empty());
    }

    #[test]
    fn test_host_from_report_name() {
        assert_eq!(
            host_from_report_name(Path::new("/r/10.0.0.1_report.html")),
            Some("10.0.0.1".into())
        );
        // only the leading token counts, even for identities containing `_`
        assert_eq!(
            host_from_report_name(Path::new("core_sw_report.html")),
            Some("core".into())
        );
        assert_eq!(
            host_from_report_name(Path::new("10.0.0.2_legacy.html")),
            Some("10.0.0.2".into())
        );
        assert_eq!(host_from_report_name(Path::new("_report.html")), None);
    }

    #[test]
    fn test_unreadable_report_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("10.0.0.1_report.html");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(extract_file(&path, ColumnLayout::Standard).is_empty());
        assert!(extract_file(&dir.path().join("missing.html"), ColumnLayout::Standard).is_empty());
    }

    #[test]
    fn test_load_host_reports_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("192.168.1.1_report.html"),
            report(&[row("Default Credentials", "High")]),
        )
        .unwrap();
        fs::write(
            dir.path().join("10.0.0.5_report.html"),
            report(&[row("Default Credentials", "High"), row("Telnet Enabled", "Medium")]),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let reports = load_host_reports(dir.path(), "html", ColumnLayout::Standard).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].host.as_str(), "10.0.0.5");
        assert_eq!(reports[0].recommendations.len(), 2);
        assert_eq!(reports[1].host.as_str(), "192.168.1.1");
    }

    #[test]
    fn test_discover_reports_missing_dir() {
        let err = discover_reports(Path::new("/no/such/reports"), "html").unwrap_err();
        assert!(matches!(err, PipelineError::Discovery(_)));
    }
}
