//! Compliance configuration.
//!
//! Every tunable used by classification, grid evaluation, scoring and
//! reference selection lives in one `ComplianceConfig` that is passed into the
//! engine at construction. Files may be partial; missing keys fall back to
//! the defaults below.
//!
//! ```toml
//! cell_size_px = 50
//!
//! [classification]
//! unknown_threshold = 0.3
//! known_threshold = 0.7
//!
//! [grid]
//! max_coverage_ratio = 0.15
//! min_cell_quality = 0.7
//!
//! [reference.metal]
//! aluminum = 5
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::QcError;
use crate::material::{MetalType, QualityGrade};

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "metalgrade";
/// File name of the compliance config inside [`default_config_dir`].
pub const CONFIG_FILE_NAME: &str = "compliance.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Edge length of a grid cell in pixels
    pub cell_size_px: u32,
    pub classification: ClassificationThresholds,
    pub grid: GridThresholds,
    pub scoring: ScoringConfig,
    pub reference: ReferenceOffsets,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            cell_size_px: 50,
            classification: ClassificationThresholds::default(),
            grid: GridThresholds::default(),
            scoring: ScoringConfig::default(),
            reference: ReferenceOffsets::default(),
        }
    }
}

/// Confidence policy for the defect classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationThresholds {
    /// Below this, a detection is reported as unknown
    pub unknown_threshold: f32,
    /// At or above this, a recognized detection is a confident classification
    pub known_threshold: f32,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            unknown_threshold: 0.3,
            known_threshold: 0.7,
        }
    }
}

/// Per-cell density limits used when the standards table has no ratio of its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridThresholds {
    /// Fraction of a cell's pixels that may be defective
    pub max_coverage_ratio: f64,
    /// Minimum per-cell quality score (1 - coverage ratio)
    pub min_cell_quality: f64,
}

impl Default for GridThresholds {
    fn default() -> Self {
        Self {
            max_coverage_ratio: 0.15,
            min_cell_quality: 0.7,
        }
    }
}

/// Report score deductions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per failing cell
    pub fail_cell_penalty: f64,
    /// Cap on the total failing-cell deduction
    pub max_fail_penalty: f64,
    /// Points per unknown detection
    pub unknown_penalty: f64,
    /// Cap on the total unknown-detection deduction
    pub max_unknown_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fail_cell_penalty: 5.0,
            max_fail_penalty: 60.0,
            unknown_penalty: 2.0,
            max_unknown_penalty: 20.0,
        }
    }
}

/// Offsets combined by the reference selector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceOffsets {
    pub metal: MetalOffsets,
    pub grade: GradeOffsets,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalOffsets {
    pub carbon_steel: i32,
    pub stainless_steel: i32,
    pub aluminum: i32,
    pub alloy_steel: i32,
}

impl Default for MetalOffsets {
    fn default() -> Self {
        Self {
            carbon_steel: 1,
            stainless_steel: 3,
            aluminum: 5,
            alloy_steel: 7,
        }
    }
}

impl MetalOffsets {
    pub fn offset_for(&self, metal: MetalType) -> i32 {
        match metal {
            MetalType::CarbonSteel => self.carbon_steel,
            MetalType::StainlessSteel => self.stainless_steel,
            MetalType::Aluminum => self.aluminum,
            MetalType::AlloySteel => self.alloy_steel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeOffsets {
    #[serde(rename = "A")]
    pub a: i32,
    #[serde(rename = "B")]
    pub b: i32,
    #[serde(rename = "C")]
    pub c: i32,
    #[serde(rename = "D")]
    pub d: i32,
}

impl Default for GradeOffsets {
    fn default() -> Self {
        Self { a: 0, b: 1, c: 1, d: 1 }
    }
}

impl GradeOffsets {
    pub fn offset_for(&self, grade: QualityGrade) -> i32 {
        match grade {
            QualityGrade::A => self.a,
            QualityGrade::B => self.b,
            QualityGrade::C => self.c,
            QualityGrade::D => self.d,
        }
    }
}

impl ComplianceConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, QcError> {
        let config: ComplianceConfig = toml::from_str(content)
            .map_err(|e| QcError::configuration(format!("Invalid compliance config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that thresholds are internally consistent.
    pub fn validate(&self) -> Result<(), QcError> {
        if self.cell_size_px == 0 {
            return Err(QcError::configuration("cell_size_px must be at least 1"));
        }

        let c = &self.classification;
        if !(0.0..=1.0).contains(&c.unknown_threshold) || !(0.0..=1.0).contains(&c.known_threshold) {
            return Err(QcError::configuration(format!(
                "Classification thresholds must lie in [0, 1] (unknown={}, known={})",
                c.unknown_threshold, c.known_threshold
            )));
        }
        if c.unknown_threshold > c.known_threshold {
            return Err(QcError::configuration(format!(
                "unknown_threshold {} exceeds known_threshold {}",
                c.unknown_threshold, c.known_threshold
            )));
        }

        let g = &self.grid;
        if !(g.max_coverage_ratio > 0.0 && g.max_coverage_ratio <= 1.0) {
            return Err(QcError::configuration(format!(
                "max_coverage_ratio must lie in (0, 1], got {}",
                g.max_coverage_ratio
            )));
        }
        if !(0.0..=1.0).contains(&g.min_cell_quality) {
            return Err(QcError::configuration(format!(
                "min_cell_quality must lie in [0, 1], got {}",
                g.min_cell_quality
            )));
        }

        let s = &self.scoring;
        for (name, value) in [
            ("fail_cell_penalty", s.fail_cell_penalty),
            ("max_fail_penalty", s.max_fail_penalty),
            ("unknown_penalty", s.unknown_penalty),
            ("max_unknown_penalty", s.max_unknown_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(QcError::configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Load the config from `<config dir>/metalgrade/compliance.toml`, or the
    /// defaults if that file does not exist. A file that exists but does not
    /// parse or validate is an error.
    pub fn load_or_default() -> Result<Self> {
        match default_config_dir() {
            Some(dir) => Self::load_or_default_in(&dir),
            None => {
                debug!("No platform config directory, using default compliance config");
                Ok(Self::default())
            }
        }
    }

    /// Same as [`load_or_default`](Self::load_or_default) for an explicit
    /// config directory.
    pub fn load_or_default_in(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            load_config(&path)
        } else {
            debug!("No compliance config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }
}

/// Load a compliance config from a TOML file.
pub fn load_config(path: &Path) -> Result<ComplianceConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read compliance config {:?}", path))?;
    let config = ComplianceConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to load compliance config {:?}", path))?;
    info!("Loaded compliance config from {:?}", path);
    Ok(config)
}

/// Platform config directory for metalgrade (e.g. `~/.config/metalgrade`).
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}
