//! Verdict types produced by the grid compliance engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::{DefectClass, DefectKind};

/// Image-level outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        })
    }
}

/// Cell-level outcome. `Indeterminate` means the cell has defects but no
/// standard applies to its dominant defect class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CellVerdict {
    Pass,
    Fail,
    Indeterminate,
}

impl fmt::Display for CellVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellVerdict::Pass => "PASS",
            CellVerdict::Fail => "FAIL",
            CellVerdict::Indeterminate => "INDETERMINATE",
        })
    }
}

/// Why a cell did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "snake_case")]
pub enum CellReason {
    /// Longest dimension of one defect kind above its size limit
    SizeExceeded {
        defect: DefectKind,
        extent_mm: f64,
        limit_mm: f64,
    },
    /// Defective fraction of the cell above the coverage limit
    CoverageExceeded { ratio: f64, limit: f64 },
    /// Cell quality score below the configured minimum
    QualityBelowMinimum { score: f64, minimum: f64 },
    /// No size standard exists for the dominant defect class
    NoStandard { defect: DefectClass },
}

impl fmt::Display for CellReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellReason::SizeExceeded {
                defect,
                extent_mm,
                limit_mm,
            } => write!(
                f,
                "{} extent {:.2} mm exceeds limit {:.2} mm",
                defect, extent_mm, limit_mm
            ),
            CellReason::CoverageExceeded { ratio, limit } => write!(
                f,
                "defect coverage {:.1}% exceeds limit {:.1}%",
                ratio * 100.0,
                limit * 100.0
            ),
            CellReason::QualityBelowMinimum { score, minimum } => {
                write!(f, "quality score {:.2} below minimum {:.2}", score, minimum)
            }
            CellReason::NoStandard { defect } => {
                write!(f, "no standard defined for {}", defect)
            }
        }
    }
}

/// Evaluated grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    /// Top-left pixel
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub defect_pixel_count: u64,
    pub total_pixel_count: u64,
    pub coverage_ratio: f64,
    /// `1 - coverage_ratio`
    pub quality_score: f64,
    pub defect_area_mm2: f64,
    /// Longest side of the dominant defect's bounding box within the cell
    pub defect_extent_mm: f64,
    pub dominant_defect: Option<DefectClass>,
    /// Size limit for the dominant defect, if a standard exists
    pub max_size_mm: Option<f64>,
    /// Coverage limit applied to this cell
    pub local_threshold_ratio: f64,
    pub verdict: CellVerdict,
    #[serde(default)]
    pub reasons: Vec<CellReason>,
}

/// Aggregate quality figures over the whole grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMetrics {
    /// Mean cell quality score
    pub overall_quality: f64,
    /// Defect pixels over image pixels
    pub defect_density: f64,
    /// `1 - stddev(cell coverage ratios)`
    pub uniformity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub rows: u32,
    pub cols: u32,
    pub cell_size_px: u32,
    /// Thickness bracket the material resolved to
    pub bracket: String,
    pub total_cells: u32,
    pub cells_with_defects: u32,
    pub failed_cells: u32,
    pub indeterminate_count: u32,
    /// Failed cells over total cells
    pub failure_rate: f64,
    pub metrics: GridMetrics,
}

impl GridSummary {
    pub fn passed_cells(&self) -> u32 {
        self.total_cells - self.failed_cells - self.indeterminate_count
    }
}

/// Result of evaluating one image against the standards table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    /// FAIL iff at least one cell failed
    pub overall: Verdict,
    pub failing_cells: Vec<GridCell>,
    pub indeterminate_cells: Vec<GridCell>,
    /// Reference card for traceability, in `1..=8`
    pub reference_index: u8,
    pub grid: GridSummary,
}

impl ComplianceVerdict {
    pub fn is_pass(&self) -> bool {
        self.overall == Verdict::Pass
    }
}
