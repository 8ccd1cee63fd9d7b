//! Quality report: score, rating, caveats and recommendations for one image.

mod builder;
mod types;

pub use builder::QualityReport;
pub use types::*;
