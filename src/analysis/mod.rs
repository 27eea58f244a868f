//! Analysis modules.
//!
//! Cross-host merging of extracted recommendations.

pub mod aggregator;

pub use aggregator::*;
