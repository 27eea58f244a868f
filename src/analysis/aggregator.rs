//! Issue aggregation across hosts.
//!
//! This module merges the per-host recommendation lists into a single
//! issue-by-host incidence matrix and computes a few summary statistics
//! over it.

use crate::models::{AggregateRow, DeviceIdentity, HostReport, IssueMatrix, IssueMetadata};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Merge host reports into an incidence matrix.
///
/// Rows follow the order in which issues were first seen. Metadata comes
/// from the first host reporting the issue; later hosts never overwrite
/// it. Host columns are sorted ascending.
pub fn build_matrix(reports: &[HostReport]) -> IssueMatrix {
    let mut order: Vec<String> = Vec::new();
    let mut incidence: HashMap<String, BTreeSet<DeviceIdentity>> = HashMap::new();
    let mut metadata: HashMap<String, IssueMetadata> = HashMap::new();

    for report in reports {
        for rec in &report.recommendations {
            incidence
                .entry(rec.issue.clone())
                .or_insert_with(|| {
                    order.push(rec.issue.clone());
                    BTreeSet::new()
                })
                .insert(report.host.clone());

            if let Some(first) = metadata.get(&rec.issue) {
                if *first != rec.metadata() {
                    debug!(
                        "Metadata for '{}' from {} differs from first sample, keeping first",
                        rec.issue, report.host
                    );
                }
            } else {
                metadata.insert(rec.issue.clone(), rec.metadata());
            }
        }
    }

    let hosts: BTreeSet<DeviceIdentity> = incidence.values().flatten().cloned().collect();
    let hosts: Vec<DeviceIdentity> = hosts.into_iter().collect();

    let rows = order
        .into_iter()
        .map(|issue| {
            let reported_by = &incidence[&issue];
            AggregateRow {
                incidence: hosts.iter().map(|h| reported_by.contains(h)).collect(),
                metadata: metadata.remove(&issue).unwrap_or_default(),
                issue,
            }
        })
        .collect();

    IssueMatrix { hosts, rows }
}

/// Number of distinct issues reported per host, in column order.
pub fn issues_per_host(matrix: &IssueMatrix) -> Vec<(DeviceIdentity, usize)> {
    matrix
        .hosts
        .iter()
        .enumerate()
        .map(|(column, host)| {
            let count = matrix.rows.iter().filter(|r| r.incidence[column]).count();
            (host.clone(), count)
        })
        .collect()
}

/// Issues affecting the most hosts, widest first.
pub fn most_widespread_issues(matrix: &IssueMatrix, n: usize) -> Vec<(&AggregateRow, usize)> {
    let mut issues: Vec<_> = matrix
        .rows
        .iter()
        .map(|r| (r, r.incidence.iter().filter(|&&hit| hit).count()))
        .collect();

    // stable sort keeps first-seen order among ties
    issues.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    issues.truncate(n);
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recommendation;

    fn rec(issue: &str, impact: &str) -> Recommendation {
        Recommendation {
            issue: issue.to_string(),
            overall: "High".to_string(),
            impact: impact.to_string(),
            ease: "Easy".to_string(),
            fix: "Quick".to_string(),
            recommendation: format!("Resolve {}", issue),
        }
    }

    fn host(name: &str, recs: Vec<Recommendation>) -> HostReport {
        HostReport {
            host: name.into(),
            recommendations: recs,
        }
    }

    #[test]
    fn test_empty_input() {
        let matrix = build_matrix(&[]);
        assert!(matrix.is_empty());
        assert!(matrix.hosts.is_empty());

        let matrix = build_matrix(&[host("10.0.0.1", vec![])]);
        assert!(matrix.is_empty());
        assert!(matrix.hosts.is_empty());
    }

    #[test]
    fn test_hosts_sorted_and_complete() {
        let reports = vec![
            host("192.168.1.1", vec![rec("Default Credentials", "High")]),
            host("10.0.0.5", vec![rec("Default Credentials", "High"), rec("Telnet", "Medium")]),
            host("172.16.0.1", vec![]),
        ];
        let matrix = build_matrix(&reports);

        let hosts: Vec<&str> = matrix.hosts.iter().map(|h| h.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.5", "192.168.1.1"]);
        assert_eq!(matrix.rows.len(), 2);
        for row in &matrix.rows {
            assert_eq!(row.incidence.len(), matrix.hosts.len());
        }

        assert_eq!(matrix.incidence("Default Credentials", "10.0.0.5"), Some(true));
        assert_eq!(matrix.incidence("Default Credentials", "192.168.1.1"), Some(true));
        assert_eq!(matrix.incidence("Telnet", "10.0.0.5"), Some(true));
        assert_eq!(matrix.incidence("Telnet", "192.168.1.1"), Some(false));
    }

    #[test]
    fn test_rows_in_first_seen_order() {
        let reports = vec![
            host("b", vec![rec("Zeta", "Low"), rec("Alpha", "Low")]),
            host("a", vec![rec("Mid", "Low"), rec("Zeta", "Low")]),
        ];
        let matrix = build_matrix(&reports);
        let issues: Vec<&str> = matrix.rows.iter().map(|r| r.issue.as_str()).collect();
        assert_eq!(issues, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_first_seen_metadata_wins() {
        let reports = vec![
            host("hostA", vec![rec("Weak Cipher", "High")]),
            host("hostB", vec![rec("Weak Cipher", "Medium")]),
        ];
        let matrix = build_matrix(&reports);
        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].metadata.impact, "High");
        assert_eq!(matrix.rows[0].incidence, vec![true, true]);
    }

    #[test]
    fn test_duplicate_rows_in_one_report_collapse() {
        let reports = vec![host(
            "10.0.0.1",
            vec![rec("Weak Cipher", "High"), rec("Weak Cipher", "Low"), rec("", "Low")],
        )];
        let matrix = build_matrix(&reports);
        assert_eq!(matrix.rows.len(), 2);
        assert_eq!(matrix.row("Weak Cipher").unwrap().metadata.impact, "High");
        assert!(matrix.row("").is_some());
    }

    #[test]
    fn test_issues_per_host() {
        let reports = vec![
            host("a", vec![rec("X", "Low"), rec("Y", "Low")]),
            host("b", vec![rec("X", "Low")]),
        ];
        let matrix = build_matrix(&reports);
        let counts = issues_per_host(&matrix);
        assert_eq!(counts, vec![("a".into(), 2), ("b".into(), 1)]);
    }

    #[test]
    fn test_most_widespread_issues() {
        let reports = vec![
            host("a", vec![rec("Rare", "Low"), rec("Common", "Low")]),
            host("b", vec![rec("Common", "Low")]),
            host("c", vec![rec("Common", "Low"), rec("Some", "Low")]),
        ];
        let matrix = build_matrix(&reports);
        let top = most_widespread_issues(&matrix, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0.issue, "Common");
        assert_eq!(top[0].1, 3);
        assert_eq!(top[1].0.issue, "Rare");
    }
}
