//! Defect classification against the trained defect-kind set.
//!
//! Detector labels are matched against a closed enumeration; anything the
//! model was not trained on, or anything below the confidence floor, becomes
//! an explicit `Unknown` carrying a fixed user-facing message instead of a
//! fabricated type name.

#[allow(clippy::module_inception)]
mod classifier;
mod types;

pub use classifier::DefectClassifier;
pub use types::*;
