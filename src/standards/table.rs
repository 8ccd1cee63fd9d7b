//! Validated, read-only standards table with O(1) keyed lookup.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::classifier::DefectKind;
use crate::error::QcError;
use crate::material::{MetalType, QualityGrade};

use super::types::*;

/// Size limits keyed by (metal, thickness bracket, grade, defect).
///
/// Built once from a [`StandardsFile`] and never mutated afterwards, so a
/// single table can be shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct StandardsTable {
    standard: String,
    brackets: Vec<ThicknessBracket>,
    entries: HashMap<ThresholdKey, ThresholdEntry>,
}

impl StandardsTable {
    /// Parse and validate a table from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, QcError> {
        let file: StandardsFile = toml::from_str(content)
            .map_err(|e| QcError::configuration(format!("Invalid standards table: {}", e)))?;
        Self::from_file(file)
    }

    /// Validate brackets and expand limit rows into keyed entries.
    pub fn from_file(file: StandardsFile) -> Result<Self, QcError> {
        let brackets = validate_brackets(&file.brackets)?;

        let bracket_ids: HashMap<&str, BracketId> = brackets
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), BracketId(i)))
            .collect();

        let mut entries = HashMap::new();
        for (row_idx, row) in file.limits.iter().enumerate() {
            let row_brackets: Vec<BracketId> = if row.brackets.is_empty() {
                (0..brackets.len()).map(BracketId).collect()
            } else {
                row.brackets
                    .iter()
                    .map(|name| {
                        bracket_ids.get(name.as_str()).copied().ok_or_else(|| {
                            QcError::configuration(format!(
                                "Limit row {} references unknown bracket '{}'",
                                row_idx + 1,
                                name
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?
            };

            for grade in QualityGrade::ALL {
                let size = row.max_size_mm.get(grade);
                if !size.is_finite() || size <= 0.0 {
                    return Err(QcError::configuration(format!(
                        "Limit row {}: max_size_mm for grade {} must be positive, got {}",
                        row_idx + 1,
                        grade.letter(),
                        size
                    )));
                }
                let ratio = row.max_coverage_ratio.map(|r| r.get(grade));
                if let Some(ratio) = ratio {
                    if !(ratio > 0.0 && ratio <= 1.0) {
                        return Err(QcError::configuration(format!(
                            "Limit row {}: max_coverage_ratio for grade {} must lie in (0, 1], got {}",
                            row_idx + 1,
                            grade.letter(),
                            ratio
                        )));
                    }
                }

                for &metal in &row.metals {
                    for &bracket in &row_brackets {
                        for &defect in &row.defects {
                            let key = ThresholdKey {
                                metal_type: metal,
                                bracket,
                                quality_grade: grade,
                                defect_kind: defect,
                            };
                            let entry = ThresholdEntry {
                                metal_type: metal,
                                bracket,
                                quality_grade: grade,
                                defect_kind: defect,
                                max_size_mm: size * brackets[bracket.0].size_factor,
                                max_coverage_ratio: ratio,
                            };
                            if entries.insert(key, entry).is_some() {
                                return Err(QcError::configuration(format!(
                                    "Duplicate limit for {} / {} / grade {} / {}",
                                    metal.as_str(),
                                    brackets[bracket.0].name,
                                    grade.letter(),
                                    defect
                                )));
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "Built standards table '{}': {} brackets, {} entries",
            file.standard,
            brackets.len(),
            entries.len()
        );

        Ok(Self {
            standard: file.standard,
            brackets,
            entries,
        })
    }

    /// Name of the standard the limits come from.
    pub fn standard(&self) -> &str {
        &self.standard
    }

    pub fn brackets(&self) -> &[ThicknessBracket] {
        &self.brackets
    }

    pub fn bracket(&self, id: BracketId) -> Option<&ThicknessBracket> {
        self.brackets.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a thickness onto its bracket.
    ///
    /// Lower bounds are inclusive and upper bounds exclusive, so a thickness
    /// exactly on a boundary belongs to the thicker bracket.
    pub fn resolve_bracket(&self, thickness_mm: f64) -> Result<BracketId, QcError> {
        if !thickness_mm.is_finite() || thickness_mm <= 0.0 {
            return Err(QcError::input(format!(
                "Thickness must be a positive number of millimetres, got {}",
                thickness_mm
            )));
        }
        self.brackets
            .iter()
            .position(|b| b.contains(thickness_mm))
            .map(BracketId)
            .ok_or_else(|| {
                let min = self.brackets.first().map_or(0.0, |b| b.min_mm);
                QcError::configuration(format!(
                    "Thickness {} mm is not covered by any bracket of {} (minimum {} mm)",
                    thickness_mm, self.standard, min
                ))
            })
    }

    /// Keyed O(1) lookup. `None` means no standard is defined for the key.
    pub fn entry(&self, key: &ThresholdKey) -> Option<&ThresholdEntry> {
        self.entries.get(key)
    }

    /// Resolve the bracket for `thickness_mm` and look up the limit.
    ///
    /// `Ok(None)` is a lookup miss (valid inputs, no standard defined); it
    /// is neither a pass nor a fail and must be surfaced by the caller.
    pub fn lookup(
        &self,
        metal_type: MetalType,
        thickness_mm: f64,
        quality_grade: QualityGrade,
        defect_kind: DefectKind,
    ) -> Result<Option<&ThresholdEntry>, QcError> {
        let bracket = self.resolve_bracket(thickness_mm)?;
        Ok(self.entry(&ThresholdKey {
            metal_type,
            bracket,
            quality_grade,
            defect_kind,
        }))
    }
}

fn validate_brackets(defs: &[BracketDefinition]) -> Result<Vec<ThicknessBracket>, QcError> {
    if defs.is_empty() {
        return Err(QcError::configuration("Standards table defines no thickness brackets"));
    }

    let mut seen = HashSet::new();
    for (i, def) in defs.iter().enumerate() {
        if !seen.insert(def.name.as_str()) {
            return Err(QcError::configuration(format!(
                "Duplicate bracket name '{}'",
                def.name
            )));
        }
        if !def.min_mm.is_finite() || def.min_mm < 0.0 {
            return Err(QcError::configuration(format!(
                "Bracket '{}' has invalid min_mm {}",
                def.name, def.min_mm
            )));
        }
        if !def.size_factor.is_finite() || def.size_factor <= 0.0 {
            return Err(QcError::configuration(format!(
                "Bracket '{}' has invalid size_factor {}",
                def.name, def.size_factor
            )));
        }

        let is_last = i + 1 == defs.len();
        match (def.max_mm, is_last) {
            (None, true) => {}
            (None, false) => {
                return Err(QcError::configuration(format!(
                    "Only the last bracket may be open-ended, but '{}' has no max_mm",
                    def.name
                )))
            }
            (Some(_), true) => {
                return Err(QcError::configuration(format!(
                    "Last bracket '{}' must be open-ended",
                    def.name
                )))
            }
            (Some(max), false) => {
                if !(max > def.min_mm) {
                    return Err(QcError::configuration(format!(
                        "Bracket '{}' has max_mm {} not above min_mm {}",
                        def.name, max, def.min_mm
                    )));
                }
                let next = &defs[i + 1];
                if next.min_mm != max {
                    return Err(QcError::configuration(format!(
                        "Brackets '{}' and '{}' are not contiguous ({} vs {})",
                        def.name, next.name, max, next.min_mm
                    )));
                }
            }
        }
    }

    Ok(defs
        .iter()
        .map(|def| ThicknessBracket {
            name: def.name.clone(),
            min_mm: def.min_mm,
            max_mm: def.max_mm,
            size_factor: def.size_factor,
        })
        .collect())
}
