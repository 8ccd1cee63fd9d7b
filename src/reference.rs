//! Reference image selection for inspection traceability.
//!
//! Each (metal, grade) pair maps onto one of eight reference cards. The
//! index is recorded in the verdict so an inspector can pull the matching
//! card; it never influences PASS/FAIL.

use crate::config::ReferenceOffsets;
use crate::material::{MetalType, QualityGrade};

/// Lowest reference index.
pub const MIN_REFERENCE_INDEX: u8 = 1;
/// Highest reference index.
pub const MAX_REFERENCE_INDEX: u8 = 8;

/// Maps material parameters onto a reference index in `1..=8`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceSelector {
    offsets: ReferenceOffsets,
}

impl ReferenceSelector {
    pub fn new(offsets: ReferenceOffsets) -> Self {
        Self { offsets }
    }

    /// `clamp(metal_offset + grade_offset, 1, 8)`.
    pub fn select(&self, metal_type: MetalType, quality_grade: QualityGrade) -> u8 {
        let raw = self.offsets.metal.offset_for(metal_type) + self.offsets.grade.offset_for(quality_grade);
        raw.clamp(MIN_REFERENCE_INDEX as i32, MAX_REFERENCE_INDEX as i32) as u8
    }
}
