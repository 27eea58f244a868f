//! Console progress bars for the sequential pipeline steps.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar for `len` items, or a hidden one when disabled.
pub fn step_bar(len: usize, label: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg:<16} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(label.to_string());
    pb
}
