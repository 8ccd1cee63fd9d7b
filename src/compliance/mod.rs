//! Spatial grid compliance analysis.
//!
//! Splits an image into fixed-size cells, measures the defects in each cell
//! and checks them against the standards table. The image fails if any cell
//! fails.

mod engine;
mod grid;
mod types;

pub use engine::GridComplianceEngine;
pub use grid::{CellBounds, DefectLayers, GridLayout};
pub use types::*;
