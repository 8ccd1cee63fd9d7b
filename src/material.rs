//! Material parameters supplied with each analysis request.
//!
//! The enumerations here are the documented set of valid metal types and
//! quality grades. Parsing is forgiving about spelling
//! ("Carbon Steel", "carbon-steel", "CARBON_STEEL") but never guesses: an
//! unrecognized value is an input error listing the valid choices.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QcError;

/// Metal families covered by the sizing standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetalType {
    CarbonSteel,
    StainlessSteel,
    Aluminum,
    AlloySteel,
}

impl MetalType {
    pub const ALL: [MetalType; 4] = [
        MetalType::CarbonSteel,
        MetalType::StainlessSteel,
        MetalType::Aluminum,
        MetalType::AlloySteel,
    ];

    /// Stable identifier used in config files and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetalType::CarbonSteel => "carbon_steel",
            MetalType::StainlessSteel => "stainless_steel",
            MetalType::Aluminum => "aluminum",
            MetalType::AlloySteel => "alloy_steel",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MetalType::CarbonSteel => "Carbon Steel",
            MetalType::StainlessSteel => "Stainless Steel",
            MetalType::Aluminum => "Aluminum",
            MetalType::AlloySteel => "Alloy Steel",
        }
    }
}

impl fmt::Display for MetalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for MetalType {
    type Err = QcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let key = normalize_token(input);
        MetalType::ALL
            .into_iter()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| {
                QcError::input(format!(
                    "Unknown metal type '{}'. Valid values: {}",
                    input,
                    MetalType::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

/// Required quality grade; A is the strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
}

impl QualityGrade {
    pub const ALL: [QualityGrade; 4] = [
        QualityGrade::A,
        QualityGrade::B,
        QualityGrade::C,
        QualityGrade::D,
    ];

    pub fn letter(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade {}", self.letter())
    }
}

impl FromStr for QualityGrade {
    type Err = QcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let key = normalize_token(input);
        let letter = key.strip_prefix("grade_").unwrap_or(&key);
        QualityGrade::ALL
            .into_iter()
            .find(|g| g.letter().eq_ignore_ascii_case(letter))
            .ok_or_else(|| {
                QcError::input(format!(
                    "Unknown quality grade '{}'. Valid values: A, B, C, D",
                    input
                ))
            })
    }
}

/// Material description for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub metal_type: MetalType,
    /// Stock thickness in millimetres
    pub thickness_mm: f64,
    pub quality_grade: QualityGrade,
}

impl MaterialSpec {
    pub fn new(
        metal_type: MetalType,
        thickness_mm: f64,
        quality_grade: QualityGrade,
    ) -> Result<Self, QcError> {
        let spec = Self {
            metal_type,
            thickness_mm,
            quality_grade,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Thickness must be a finite positive number. Bracket coverage is
    /// checked later against the loaded standards table.
    pub fn validate(&self) -> Result<(), QcError> {
        if !self.thickness_mm.is_finite() || self.thickness_mm <= 0.0 {
            return Err(QcError::input(format!(
                "Thickness must be a positive number of millimetres, got {}",
                self.thickness_mm
            )));
        }
        Ok(())
    }
}

/// Lowercase, trim, and fold spaces/hyphens into underscores.
pub(crate) fn normalize_token(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
