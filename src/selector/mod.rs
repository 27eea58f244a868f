//! Source selection for a scan run.
//!
//! This module resolves which device configuration files feed a run,
//! according to the configured [`SelectionPolicy`].

use crate::config::SelectionConfig;
use crate::error::ConfigError;
use crate::models::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rule that decides which input files feed a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum SelectionPolicy {
    /// Files directly inside the most recently created subdirectory.
    #[default]
    LatestFolder,
    /// Files anywhere under the root, modified within the age threshold.
    RecentFiles,
    /// Union of both, deduplicated by path.
    Both,
}

impl FromStr for SelectionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "latestfolder" => Ok(SelectionPolicy::LatestFolder),
            "recentfiles" => Ok(SelectionPolicy::RecentFiles),
            "both" => Ok(SelectionPolicy::Both),
            _ => Err(ConfigError::InvalidPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for SelectionPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::LatestFolder => write!(f, "LatestFolder"),
            SelectionPolicy::RecentFiles => write!(f, "RecentFiles"),
            SelectionPolicy::Both => write!(f, "Both"),
        }
    }
}

/// Lists candidate configuration files under a root directory.
pub struct SourceSelector {
    root: PathBuf,
    extension: String,
    max_age: Duration,
}

impl SourceSelector {
    /// Create a new selector.
    pub fn new(root: PathBuf, extension: &str, max_file_age_days: u64) -> Self {
        Self {
            root,
            extension: extension.trim_start_matches('.').to_string(),
            max_age: Duration::from_secs(max_file_age_days.saturating_mul(SECONDS_PER_DAY)),
        }
    }

    /// Build a selector from the selection settings.
    pub fn from_config(root: PathBuf, config: &SelectionConfig) -> Self {
        Self::new(root, &config.extension, config.max_file_age_days)
    }

    /// Select source files under `policy`, sorted by path.
    pub fn select(&self, policy: SelectionPolicy) -> Vec<SourceFile> {
        let files = match policy {
            SelectionPolicy::LatestFolder => self.latest_folder(),
            SelectionPolicy::RecentFiles => self.recent_files(),
            SelectionPolicy::Both => {
                let mut union = self.latest_folder();
                union.extend(self.recent_files());
                union
            }
        };

        let selected = dedupe_by_path(files);
        info!(
            "Selected {} source file(s) under {} ({})",
            selected.len(),
            self.root.display(),
            policy
        );
        selected
    }

    /// Files directly inside the most recently created subdirectory.
    pub fn latest_folder(&self) -> Vec<SourceFile> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) => {
                warn!("Cannot read source directory {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let folders: Vec<(PathBuf, SystemTime)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_dir() {
                    return None;
                }
                let metadata = entry.metadata().ok()?;
                let created = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .ok()?;
                Some((path, created))
            })
            .collect();

        let Some(latest) = pick_latest(folders) else {
            warn!("No folders found in {}", self.root.display());
            return Vec::new();
        };
        info!("Latest folder found: {}", latest.display());

        let entries = match fs::read_dir(&latest) {
            Ok(e) => e,
            Err(e) => {
                warn!("Cannot read folder {}: {}", latest.display(), e);
                return Vec::new();
            }
        };

        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches_extension(path))
            .filter_map(|path| source_file(&path))
            .collect()
    }

    /// Files anywhere under the root modified within the age threshold.
    pub fn recent_files(&self) -> Vec<SourceFile> {
        let cutoff = SystemTime::now()
            .checked_sub(self.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.matches_extension(entry.path()))
            .filter_map(|entry| source_file(entry.path()))
            .filter(|file| file.modified >= cutoff)
            .collect()
    }

    /// Check if a path carries the configured extension (case-insensitive).
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

/// Pick the entry with the newest timestamp; ties go to the greatest path.
fn pick_latest(entries: Vec<(PathBuf, SystemTime)>) -> Option<PathBuf> {
    entries
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(path, _)| path)
}

fn source_file(path: &Path) -> Option<SourceFile> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            return None;
        }
    };
    let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Some(SourceFile { path, modified })
}

fn dedupe_by_path(files: Vec<SourceFile>) -> Vec<SourceFile> {
    let mut unique: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();
    for file in files {
        unique.entry(file.path.clone()).or_insert(file);
    }
    unique.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, "hostname switch\n").unwrap();
    }

    fn age(path: &Path, days: u64) {
        let file = File::options().write(true).open(path).unwrap();
        let when = SystemTime::now() - Duration::from_secs(days * SECONDS_PER_DAY);
        file.set_modified(when).unwrap();
    }

    fn names(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    /// root/
    ///   2024-01-01/ old.cfg (aged 30 days)
    ///   2024-02-01/ a.cfg, b.cfg, notes.txt
    ///   loose.cfg
    fn layout() -> TempDir {
        let dir = TempDir::new().unwrap();
        let older = dir.path().join("2024-01-01");
        fs::create_dir(&older).unwrap();
        touch(&older.join("old.cfg"));
        age(&older.join("old.cfg"), 30);

        sleep(Duration::from_millis(20));

        let newer = dir.path().join("2024-02-01");
        fs::create_dir(&newer).unwrap();
        touch(&newer.join("a.cfg"));
        touch(&newer.join("b.CFG"));
        touch(&newer.join("notes.txt"));

        touch(&dir.path().join("loose.cfg"));
        dir
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("LatestFolder".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::LatestFolder);
        assert_eq!("recent-files".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::RecentFiles);
        assert_eq!("recent_files".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::RecentFiles);
        assert_eq!("BOTH".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::Both);
        assert!("newest".parse::<SelectionPolicy>().is_err());
    }

    #[test]
    fn test_pick_latest() {
        let now = SystemTime::now();
        let entries = vec![
            (PathBuf::from("a"), now - Duration::from_secs(10)),
            (PathBuf::from("b"), now),
            (PathBuf::from("c"), now - Duration::from_secs(5)),
        ];
        assert_eq!(pick_latest(entries), Some(PathBuf::from("b")));
        assert_eq!(pick_latest(Vec::new()), None);
    }

    #[test]
    fn test_latest_folder() {
        let dir = layout();
        let selector = SourceSelector::new(dir.path().to_path_buf(), "cfg", 7);

        let mut found = names(&selector.latest_folder());
        found.sort();
        assert_eq!(found, vec!["a.cfg", "b.CFG"]);
    }

    #[test]
    fn test_latest_folder_is_not_recursive() {
        let dir = layout();
        let nested = dir.path().join("2024-02-01").join("archive");
        fs::create_dir(&nested).unwrap();
        touch(&nested.join("c.cfg"));
        let selector = SourceSelector::new(dir.path().to_path_buf(), "cfg", 7);

        let mut found = names(&selector.latest_folder());
        found.sort();
        assert_eq!(found, vec!["a.cfg", "b.CFG"]);

        // the nested file is still reachable through RecentFiles
        assert!(names(&selector.recent_files()).contains(&"c.cfg".to_string()));
    }

    #[test]
    fn test_latest_folder_without_subdirectories() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("loose.cfg"));
        let selector = SourceSelector::new(dir.path().to_path_buf(), "cfg", 7);
        assert!(selector.latest_folder().is_empty());
    }

    #[test]
    fn test_latest_folder_unreadable_root() {
        let selector = SourceSelector::new(PathBuf::from("/no/such/root"), "cfg", 7);
        assert!(selector.latest_folder().is_empty());
        assert!(selector.select(SelectionPolicy::Both).is_empty());
    }

    #[test]
    fn test_recent_files() {
        let dir = layout();
        let selector = SourceSelector::new(dir.path().to_path_buf(), "cfg", 7);

        let mut found = names(&selector.recent_files());
        found.sort();
        assert_eq!(found, vec!["a.cfg", "b.CFG", "loose.cfg"]);

        let wide = SourceSelector::new(dir.path().to_path_buf(), "cfg", 60);
        assert_eq!(wide.recent_files().len(), 4);
    }

    #[test]
    fn test_both_is_union_without_duplicates() {
        let dir = layout();
        let selector = SourceSelector::new(dir.path().to_path_buf(), "cfg", 60);

        let latest = selector.select(SelectionPolicy::LatestFolder);
        let recent = selector.select(SelectionPolicy::RecentFiles);
        let both = selector.select(SelectionPolicy::Both);

        let mut expected: Vec<PathBuf> = latest
            .iter()
            .chain(recent.iter())
            .map(|f| f.path.clone())
            .collect();
        expected.sort();
        expected.dedup();

        let got: Vec<PathBuf> = both.iter().map(|f| f.path.clone()).collect();
        assert_eq!(got, expected);
        assert_eq!(both.len(), 4);
    }

    #[test]
    fn test_extension_match() {
        let selector = SourceSelector::new(PathBuf::from("."), ".cfg", 7);
        assert!(selector.matches_extension(Path::new("x/10.0.0.1.cfg")));
        assert!(selector.matches_extension(Path::new("SWITCH.CFG")));
        assert!(!selector.matches_extension(Path::new("switch.cfg.bak")));
        assert!(!selector.matches_extension(Path::new("cfg")));
    }
}
