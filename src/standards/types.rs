//! Type definitions for the standards table.
//!
//! The `*Definition`/`LimitRow` types mirror the TOML file; the remaining
//! types are the expanded, validated form served to the compliance engine.

use serde::{Deserialize, Serialize};

use crate::classifier::DefectKind;
use crate::material::{MetalType, QualityGrade};

// =============================================================================
// FILE TYPES (loaded from TOML)
// =============================================================================

/// Root of a standards TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardsFile {
    /// Name of the standard the limits come from
    #[serde(default = "default_standard_name")]
    pub standard: String,
    /// Thickness brackets in ascending order
    pub brackets: Vec<BracketDefinition>,
    /// Limit rows, expanded into one entry per 4-tuple
    #[serde(default)]
    pub limits: Vec<LimitRow>,
}

fn default_standard_name() -> String {
    "unnamed standard".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BracketDefinition {
    pub name: String,
    /// Inclusive lower bound
    pub min_mm: f64,
    /// Exclusive upper bound; only the last bracket may omit it
    #[serde(default)]
    pub max_mm: Option<f64>,
    #[serde(default = "default_size_factor")]
    pub size_factor: f64,
}

fn default_size_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitRow {
    pub metals: Vec<MetalType>,
    /// Bracket names; empty means every bracket
    #[serde(default)]
    pub brackets: Vec<String>,
    pub defects: Vec<DefectKind>,
    pub max_size_mm: GradeValues,
    #[serde(default)]
    pub max_coverage_ratio: Option<GradeValues>,
}

/// One value per quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GradeValues {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl GradeValues {
    pub fn get(&self, grade: QualityGrade) -> f64 {
        match grade {
            QualityGrade::A => self.a,
            QualityGrade::B => self.b,
            QualityGrade::C => self.c,
            QualityGrade::D => self.d,
        }
    }
}

// =============================================================================
// TABLE TYPES (validated, read-only after load)
// =============================================================================

/// Index of a bracket within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BracketId(pub usize);

/// Thickness range `[min_mm, max_mm)`, open-ended when `max_mm` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThicknessBracket {
    pub name: String,
    pub min_mm: f64,
    pub max_mm: Option<f64>,
    pub size_factor: f64,
}

impl ThicknessBracket {
    pub fn contains(&self, thickness_mm: f64) -> bool {
        thickness_mm >= self.min_mm && self.max_mm.map_or(true, |max| thickness_mm < max)
    }
}

/// Lookup key for a threshold entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThresholdKey {
    pub metal_type: MetalType,
    pub bracket: BracketId,
    pub quality_grade: QualityGrade,
    pub defect_kind: DefectKind,
}

/// Maximum permissible defect size for one (metal, bracket, grade, defect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub metal_type: MetalType,
    pub bracket: BracketId,
    pub quality_grade: QualityGrade,
    pub defect_kind: DefectKind,
    /// Longest permissible defect dimension, bracket size factor applied
    pub max_size_mm: f64,
    /// Per-cell coverage limit; `None` defers to the configured default
    pub max_coverage_ratio: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_contains_is_half_open() {
        let bracket = ThicknessBracket {
            name: "medium".to_string(),
            min_mm: 3.2,
            max_mm: Some(6.4),
            size_factor: 1.0,
        };
        assert!(bracket.contains(3.2));
        assert!(bracket.contains(6.399));
        assert!(!bracket.contains(6.4));
        assert!(!bracket.contains(3.199));
    }

    #[test]
    fn test_open_bracket_has_no_upper_bound() {
        let bracket = ThicknessBracket {
            name: "plate".to_string(),
            min_mm: 25.4,
            max_mm: None,
            size_factor: 1.2,
        };
        assert!(bracket.contains(25.4));
        assert!(bracket.contains(1000.0));
        assert!(!bracket.contains(25.0));
    }

    #[test]
    fn test_limit_row_deserialize() {
        let toml = r#"
            metals = ["aluminum"]
            defects = ["scratches", "oil_spot"]
            max_size_mm = { A = 0.8, B = 1.6, C = 3.2, D = 6.4 }
        "#;
        let row: LimitRow = toml::from_str(toml).unwrap();
        assert_eq!(row.metals, vec![MetalType::Aluminum]);
        assert_eq!(row.defects, vec![DefectKind::Scratches, DefectKind::OilSpot]);
        assert!(row.brackets.is_empty());
        assert!(row.max_coverage_ratio.is_none());
        assert_eq!(row.max_size_mm.get(QualityGrade::C), 3.2);
    }

    #[test]
    fn test_bracket_definition_default_factor() {
        let def: BracketDefinition = toml::from_str("name = \"thin\"\nmin_mm = 1.5\nmax_mm = 3.2").unwrap();
        assert_eq!(def.size_factor, 1.0);
        assert_eq!(def.max_mm, Some(3.2));
    }
}
