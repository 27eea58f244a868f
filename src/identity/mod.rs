//! Device identity normalization.
//!
//! Staged configuration files are renamed to `{identity}.{ext}` where the
//! identity is a leading dotted-quad address or, failing that, the file
//! stem. When several files map to the same identity the last one in
//! filename order wins.

use crate::error::{PipelineError, PipelineResult};
use crate::models::DeviceIdentity;
use crate::progress::step_bar;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Leading dotted quad; octets are not range-checked.
const IP_PREFIX_PATTERN: &str = r"^[0-9]{1,3}(\.[0-9]{1,3}){3}";

fn ip_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IP_PREFIX_PATTERN).expect("identity pattern is valid"))
}

/// A staged input after renaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInput {
    pub identity: DeviceIdentity,
    pub path: PathBuf,
}

/// Derive the device identity of a file name.
pub fn extract_identity(file_name: &str) -> DeviceIdentity {
    if let Some(m) = ip_prefix().find(file_name) {
        return DeviceIdentity::new(m.as_str());
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    DeviceIdentity::new(stem)
}

/// Rename every `*.{source_ext}` file in `dir` to `{identity}.{staged_ext}`.
///
/// Files are processed in lexicographic order and an existing destination
/// is deleted before the rename, so the last file in that order survives.
/// Any I/O error aborts; files renamed so far stay renamed.
pub fn normalize_staged(
    dir: &Path,
    source_ext: &str,
    staged_ext: &str,
    show_progress: bool,
) -> PipelineResult<Vec<NormalizedInput>> {
    let mut files: Vec<String> = fs::read_dir(dir)
        .map_err(|e| PipelineError::normalize(format!("list {}", dir.display()), e))?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| has_extension(name, source_ext))
        .collect();
    files.sort();

    if files.is_empty() {
        warn!("No .{} files found for renaming in {}", source_ext, dir.display());
        return Ok(Vec::new());
    }

    info!("Renaming {} file(s)...", files.len());
    let pb = step_bar(files.len(), "Renaming files", show_progress);
    let mut normalized: BTreeMap<DeviceIdentity, PathBuf> = BTreeMap::new();

    for name in &files {
        let identity = extract_identity(name);
        let from = dir.join(name);
        let to = dir.join(format!("{}.{}", identity, staged_ext));

        if from != to {
            if to.exists() {
                fs::remove_file(&to).map_err(|e| {
                    PipelineError::normalize(format!("remove {}", to.display()), e)
                })?;
                debug!("Overwritten existing file: {} (by {})", to.display(), name);
            }
            fs::rename(&from, &to).map_err(|e| {
                PipelineError::normalize(format!("rename {} -> {}", name, to.display()), e)
            })?;
        }

        normalized.insert(identity, to);
        pb.inc(1);
    }

    pb.finish_with_message("Renamed files");
    info!(
        "Normalized {} file(s) into {} device identit(ies)",
        files.len(),
        normalized.len()
    );

    Ok(normalized
        .into_iter()
        .map(|(identity, path)| NormalizedInput { identity, path })
        .collect())
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
        .unwrap_or(false)
}
