//! Type-2 slowly changing dimensions
//!
//! - [`detector`] - classifies a snapshot into new, changed and unchanged
//! - [`manager`] - closes and inserts versions for a change set

pub mod detector;
pub mod manager;

pub use detector::{classify, detect_changes, ChangeKind, ChangeSet};
pub use manager::{DimensionOutcome, VersionManager};
