//! Data models for the audit aggregator.
//!
//! This module contains the core data structures passed between the
//! pipeline stages: source files, device identities, recommendations
//! and the aggregated issue matrix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// A configuration file picked up by the source selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Canonical per-device label: a dotted-quad prefix or a filename stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One row of a scanner report's recommendations table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Issue title; the merge key across hosts.
    pub issue: String,
    pub overall: String,
    pub impact: String,
    pub ease: String,
    pub fix: String,
    pub recommendation: String,
}

impl Recommendation {
    /// Split off the per-issue metadata shared across hosts.
    pub fn metadata(&self) -> IssueMetadata {
        IssueMetadata {
            overall: self.overall.clone(),
            impact: self.impact.clone(),
            ease: self.ease.clone(),
            fix: self.fix.clone(),
            recommendation: self.recommendation.clone(),
        }
    }
}

/// Remediation metadata attached to an issue row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub overall: String,
    pub impact: String,
    pub ease: String,
    pub fix: String,
    pub recommendation: String,
}

/// Recommendations extracted from a single host's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub host: DeviceIdentity,
    pub recommendations: Vec<Recommendation>,
}

/// One issue row of the aggregated matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub issue: String,
    /// Incidence flags, aligned with [`IssueMatrix::hosts`].
    pub incidence: Vec<bool>,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
}

/// Issue-by-host incidence matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMatrix {
    /// Host columns, sorted ascending.
    pub hosts: Vec<DeviceIdentity>,
    /// Rows in first-seen issue order.
    pub rows: Vec<AggregateRow>,
}

/// Trailing metadata columns, in export order.
pub const METADATA_COLUMNS: [&str; 5] = ["Overall", "Impact", "Ease", "Fix", "Recommendation"];

impl IssueMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full header: Issue, host columns, then metadata columns.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.hosts.len() + 1 + METADATA_COLUMNS.len());
        columns.push("Issue".to_string());
        columns.extend(self.hosts.iter().map(|h| h.to_string()));
        columns.extend(METADATA_COLUMNS.iter().map(|c| c.to_string()));
        columns
    }

    /// Look up a row by issue title.
    #[cfg(test)]
    pub fn row(&self, issue: &str) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.issue == issue)
    }

    /// Incidence of `issue` on `host`, if both exist in the matrix.
    #[cfg(test)]
    pub fn incidence(&self, issue: &str, host: &str) -> Option<bool> {
        let column = self.hosts.iter().position(|h| h.as_str() == host)?;
        self.row(issue).map(|r| r.incidence[column])
    }
}

impl AggregateRow {
    /// Render this row as flat string cells matching [`IssueMatrix::columns`].
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.incidence.len() + 6);
        cells.push(self.issue.clone());
        cells.extend(
            self.incidence
                .iter()
                .map(|&hit| if hit { "1" } else { "0" }.to_string()),
        );
        cells.push(self.metadata.overall.clone());
        cells.push(self.metadata.impact.clone());
        cells.push(self.metadata.ease.clone());
        cells.push(self.metadata.fix.clone());
        cells.push(self.metadata.recommendation.clone());
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> IssueMatrix {
        IssueMatrix {
            hosts: vec!["10.0.0.5".into(), "192.168.1.1".into()],
            rows: vec![AggregateRow {
                issue: "Default Credentials".to_string(),
                incidence: vec![true, false],
                metadata: IssueMetadata {
                    overall: "High".to_string(),
                    impact: "Critical".to_string(),
                    ease: "Trivial".to_string(),
                    fix: "Quick".to_string(),
                    recommendation: "Change the password".to_string(),
                },
            }],
        }
    }

    #[test]
    fn test_columns_order() {
        let matrix = sample_matrix();
        assert_eq!(
            matrix.columns(),
            vec![
                "Issue",
                "10.0.0.5",
                "192.168.1.1",
                "Overall",
                "Impact",
                "Ease",
                "Fix",
                "Recommendation"
            ]
        );
    }

    #[test]
    fn test_row_cells_match_columns() {
        let matrix = sample_matrix();
        let cells = matrix.rows[0].cells();
        assert_eq!(cells.len(), matrix.columns().len());
        assert_eq!(cells[1], "1");
        assert_eq!(cells[2], "0");
        assert_eq!(cells[3], "High");
    }

    #[test]
    fn test_incidence_lookup() {
        let matrix = sample_matrix();
        assert_eq!(matrix.incidence("Default Credentials", "10.0.0.5"), Some(true));
        assert_eq!(matrix.incidence("Default Credentials", "192.168.1.1"), Some(false));
        assert_eq!(matrix.incidence("Missing", "10.0.0.5"), None);
        assert_eq!(matrix.incidence("Default Credentials", "1.1.1.1"), None);
    }

    #[test]
    fn test_identity_ordering() {
        let mut ids: Vec<DeviceIdentity> =
            vec!["192.168.1.1".into(), "10.0.0.5".into(), "core-sw".into()];
        ids.sort();
        assert_eq!(ids[0].as_str(), "10.0.0.5");
        assert_eq!(ids[2].as_str(), "core-sw");
    }
}
