//! Cell-by-cell evaluation of defect layers against the standards table.
//!
//! The `GridComplianceEngine` partitions the image into cells, measures the
//! defects inside each cell and checks them against the size limit for the
//! material, then folds the cell verdicts into an image verdict.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::classifier::DefectClass;
use crate::config::ComplianceConfig;
use crate::error::QcError;
use crate::material::MaterialSpec;
use crate::mask::DefectMask;
use crate::reference::ReferenceSelector;
use crate::standards::{BracketId, StandardsTable, ThresholdKey};

use super::grid::{CellBounds, DefectLayers, GridLayout};
use super::types::*;

/// Pixel statistics for one defect class inside one cell.
#[derive(Debug, Clone, Copy)]
struct ClassStats {
    pixels: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl ClassStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixels: 1,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.pixels += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Longest side of the bounding box, in pixels.
    fn extent_px(&self) -> u32 {
        (self.max_x - self.min_x + 1).max(self.max_y - self.min_y + 1)
    }
}

/// The grid compliance engine.
///
/// Holds a shared, read-only standards table and the injected config; one
/// engine can evaluate any number of images, from any number of threads.
pub struct GridComplianceEngine {
    standards: Arc<StandardsTable>,
    config: ComplianceConfig,
    reference: ReferenceSelector,
}

impl GridComplianceEngine {
    /// Create a new engine.
    ///
    /// # Arguments
    /// * `standards` - Size limits (typically from `default_standards()` or `load_standards()`)
    /// * `config` - Cell size and grid thresholds; rejected with
    ///   `ConfigurationError` if it does not validate
    pub fn new(standards: Arc<StandardsTable>, config: ComplianceConfig) -> Result<Self, QcError> {
        config.validate()?;
        let reference = ReferenceSelector::new(config.reference);
        Ok(Self {
            standards,
            config,
            reference,
        })
    }

    pub fn standards(&self) -> &StandardsTable {
        &self.standards
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    /// Evaluate the layers using the configured cell size.
    pub fn evaluate(
        &self,
        layers: &DefectLayers,
        material: &MaterialSpec,
        pixels_per_mm: f64,
    ) -> Result<ComplianceVerdict, QcError> {
        self.evaluate_with_cell_size(layers, material, pixels_per_mm, self.config.cell_size_px)
    }

    /// Evaluate the layers on a grid of `cell_size_px` cells.
    ///
    /// # Errors
    /// * `InputError` - invalid material, non-positive `pixels_per_mm`, zero sizes
    /// * `ConfigurationError` - thickness outside every bracket of the table
    pub fn evaluate_with_cell_size(
        &self,
        layers: &DefectLayers,
        material: &MaterialSpec,
        pixels_per_mm: f64,
        cell_size_px: u32,
    ) -> Result<ComplianceVerdict, QcError> {
        material.validate()?;
        if !pixels_per_mm.is_finite() || pixels_per_mm <= 0.0 {
            return Err(QcError::input(format!(
                "pixels_per_mm must be a positive number, got {}",
                pixels_per_mm
            )));
        }
        let grid = GridLayout::new(layers.width(), layers.height(), cell_size_px)?;
        let bracket = self.standards.resolve_bracket(material.thickness_mm)?;
        let bracket_name = self
            .standards
            .bracket(bracket)
            .map(|b| b.name.clone())
            .unwrap_or_default();

        debug!(
            "Evaluating {}x{} image on {}x{} grid ({} px cells), bracket '{}'",
            layers.width(),
            layers.height(),
            grid.rows(),
            grid.cols(),
            grid.cell_size(),
            bracket_name
        );

        let union = layers.union();
        let cells: Vec<GridCell> = grid
            .cells()
            .map(|bounds| self.evaluate_cell(&bounds, layers, &union, material, bracket, pixels_per_mm))
            .collect();

        let total_cells = grid.cell_count();
        let cells_with_defects = cells.iter().filter(|c| c.defect_pixel_count > 0).count() as u32;
        let metrics = grid_metrics(&cells, union.count() as u64);

        let mut failing_cells = Vec::new();
        let mut indeterminate_cells = Vec::new();
        for cell in cells {
            match cell.verdict {
                CellVerdict::Fail => failing_cells.push(cell),
                CellVerdict::Indeterminate => {
                    warn!(
                        "Cell ({}, {}) indeterminate: no standard for {}",
                        cell.row,
                        cell.col,
                        cell.dominant_defect.map_or("unknown", |d| d.as_str())
                    );
                    indeterminate_cells.push(cell)
                }
                CellVerdict::Pass => {}
            }
        }

        let overall = if failing_cells.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        let failed = failing_cells.len() as u32;
        let indeterminate = indeterminate_cells.len() as u32;

        info!(
            "Compliance {}: {} of {} cells failed, {} indeterminate ({} {} mm, {})",
            overall,
            failed,
            total_cells,
            indeterminate,
            material.metal_type.display_name(),
            material.thickness_mm,
            material.quality_grade
        );

        Ok(ComplianceVerdict {
            overall,
            failing_cells,
            indeterminate_cells,
            reference_index: self.reference.select(material.metal_type, material.quality_grade),
            grid: GridSummary {
                rows: grid.rows(),
                cols: grid.cols(),
                cell_size_px: grid.cell_size(),
                bracket: bracket_name,
                total_cells,
                cells_with_defects,
                failed_cells: failed,
                indeterminate_count: indeterminate,
                failure_rate: failed as f64 / total_cells as f64,
                metrics,
            },
        })
    }

    fn evaluate_cell(
        &self,
        bounds: &CellBounds,
        layers: &DefectLayers,
        union: &DefectMask,
        material: &MaterialSpec,
        bracket: BracketId,
        pixels_per_mm: f64,
    ) -> GridCell {
        let total = bounds.pixel_count();
        let defect_pixels = count_in_cell(union, bounds);
        let coverage_ratio = defect_pixels as f64 / total as f64;
        let quality_score = 1.0 - coverage_ratio;
        let grid_limits = &self.config.grid;

        let mut cell = GridCell {
            row: bounds.row,
            col: bounds.col,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            defect_pixel_count: defect_pixels,
            total_pixel_count: total,
            coverage_ratio,
            quality_score,
            defect_area_mm2: defect_pixels as f64 / (pixels_per_mm * pixels_per_mm),
            defect_extent_mm: 0.0,
            dominant_defect: None,
            max_size_mm: None,
            local_threshold_ratio: grid_limits.max_coverage_ratio,
            verdict: CellVerdict::Pass,
            reasons: Vec::new(),
        };

        if defect_pixels == 0 {
            return cell;
        }

        let per_class = class_stats_in_cell(layers, bounds);
        let Some((dominant, stats)) = dominant_class(&per_class) else {
            return cell;
        };

        let entry_for = |class: DefectClass| {
            class.kind().and_then(|kind| {
                self.standards.entry(&ThresholdKey {
                    metal_type: material.metal_type,
                    bracket,
                    quality_grade: material.quality_grade,
                    defect_kind: kind,
                })
            })
        };
        let entry = entry_for(dominant);

        cell.dominant_defect = Some(dominant);
        cell.defect_extent_mm = stats.extent_px() as f64 / pixels_per_mm;
        cell.max_size_mm = entry.map(|e| e.max_size_mm);
        cell.local_threshold_ratio = entry
            .and_then(|e| e.max_coverage_ratio)
            .unwrap_or(grid_limits.max_coverage_ratio);

        // Every known class is held to its own size limit, dominant or not
        for (&class, class_stats) in &per_class {
            let (Some(kind), Some(class_entry)) = (class.kind(), entry_for(class)) else {
                continue;
            };
            let extent_mm = class_stats.extent_px() as f64 / pixels_per_mm;
            if extent_mm > class_entry.max_size_mm {
                cell.reasons.push(CellReason::SizeExceeded {
                    defect: kind,
                    extent_mm,
                    limit_mm: class_entry.max_size_mm,
                });
            }
        }
        if coverage_ratio > cell.local_threshold_ratio {
            cell.reasons.push(CellReason::CoverageExceeded {
                ratio: coverage_ratio,
                limit: cell.local_threshold_ratio,
            });
        }
        if quality_score < grid_limits.min_cell_quality {
            cell.reasons.push(CellReason::QualityBelowMinimum {
                score: quality_score,
                minimum: grid_limits.min_cell_quality,
            });
        }

        cell.verdict = if !cell.reasons.is_empty() {
            CellVerdict::Fail
        } else if entry.is_none() {
            cell.reasons.push(CellReason::NoStandard { defect: dominant });
            CellVerdict::Indeterminate
        } else {
            CellVerdict::Pass
        };

        cell
    }
}

fn count_in_cell(mask: &DefectMask, bounds: &CellBounds) -> u64 {
    let mut count = 0;
    for y in bounds.y..bounds.y + bounds.height {
        for x in bounds.x..bounds.x + bounds.width {
            if mask.get(x, y) {
                count += 1;
            }
        }
    }
    count
}

fn class_stats_in_cell(layers: &DefectLayers, bounds: &CellBounds) -> BTreeMap<DefectClass, ClassStats> {
    let mut per_class = BTreeMap::new();
    for (class, mask) in layers.iter() {
        let mut stats: Option<ClassStats> = None;
        for y in bounds.y..bounds.y + bounds.height {
            for x in bounds.x..bounds.x + bounds.width {
                if mask.get(x, y) {
                    match stats.as_mut() {
                        Some(s) => s.include(x, y),
                        None => stats = Some(ClassStats::new(x, y)),
                    }
                }
            }
        }
        if let Some(stats) = stats {
            per_class.insert(class, stats);
        }
    }
    per_class
}

/// Class with the highest coverage in the cell. All classes share the cell
/// as denominator, so this is the largest pixel count; ties go to the
/// lexically smallest class name.
fn dominant_class(per_class: &BTreeMap<DefectClass, ClassStats>) -> Option<(DefectClass, ClassStats)> {
    per_class
        .iter()
        .max_by(|(a_class, a), (b_class, b)| {
            a.pixels
                .cmp(&b.pixels)
                .then_with(|| b_class.as_str().cmp(a_class.as_str()))
        })
        .map(|(class, stats)| (*class, *stats))
}

fn grid_metrics(cells: &[GridCell], defect_pixels: u64) -> GridMetrics {
    let n = cells.len().max(1) as f64;
    let image_pixels: u64 = cells.iter().map(|c| c.total_pixel_count).sum();

    let overall_quality = cells.iter().map(|c| c.quality_score).sum::<f64>() / n;
    let mean_coverage = cells.iter().map(|c| c.coverage_ratio).sum::<f64>() / n;
    let variance = cells
        .iter()
        .map(|c| (c.coverage_ratio - mean_coverage).powi(2))
        .sum::<f64>()
        / n;

    GridMetrics {
        overall_quality,
        defect_density: if image_pixels == 0 {
            0.0
        } else {
            defect_pixels as f64 / image_pixels as f64
        },
        uniformity_score: (1.0 - variance.sqrt()).clamp(0.0, 1.0),
    }
}
