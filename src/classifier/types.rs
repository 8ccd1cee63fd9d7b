//! Type definitions for defect classification.
//!
//! Detector labels arrive as free-form strings; everything downstream works
//! with the closed `DefectKind` set plus an explicit `Unknown` class.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::material::normalize_token;

/// Fixed message attached to every detection the model was not trained on.
pub const UNKNOWN_DEFECT_MESSAGE: &str = "Unknown defect: not trained on this defect type";

/// Defect classes the detection model is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    Pitted,
    PunchingHole,
    Rolled,
    RolledPit,
    Scratches,
    SilkSpot,
    WaterSpot,
    OilSpot,
    Patches,
    Crazing,
    Crease,
    CrescentGap,
    Inclusion,
    WaistFolding,
    WeldingLine,
    MtCrack,
    MtBreak,
}

impl DefectKind {
    pub const ALL: [DefectKind; 17] = [
        DefectKind::Pitted,
        DefectKind::PunchingHole,
        DefectKind::Rolled,
        DefectKind::RolledPit,
        DefectKind::Scratches,
        DefectKind::SilkSpot,
        DefectKind::WaterSpot,
        DefectKind::OilSpot,
        DefectKind::Patches,
        DefectKind::Crazing,
        DefectKind::Crease,
        DefectKind::CrescentGap,
        DefectKind::Inclusion,
        DefectKind::WaistFolding,
        DefectKind::WeldingLine,
        DefectKind::MtCrack,
        DefectKind::MtBreak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::Pitted => "pitted",
            DefectKind::PunchingHole => "punching_hole",
            DefectKind::Rolled => "rolled",
            DefectKind::RolledPit => "rolled_pit",
            DefectKind::Scratches => "scratches",
            DefectKind::SilkSpot => "silk_spot",
            DefectKind::WaterSpot => "water_spot",
            DefectKind::OilSpot => "oil_spot",
            DefectKind::Patches => "patches",
            DefectKind::Crazing => "crazing",
            DefectKind::Crease => "crease",
            DefectKind::CrescentGap => "crescent_gap",
            DefectKind::Inclusion => "inclusion",
            DefectKind::WaistFolding => "waist_folding",
            DefectKind::WeldingLine => "welding_line",
            DefectKind::MtCrack => "mt_crack",
            DefectKind::MtBreak => "mt_break",
        }
    }

    /// Match a detector label against the trained classes.
    ///
    /// Case, surrounding whitespace, and space/hyphen separators are ignored;
    /// anything else must match exactly.
    pub fn from_label(label: &str) -> Option<DefectKind> {
        let key = normalize_token(label);
        DefectKind::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome: a trained defect kind or explicitly unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectClass {
    Known(DefectKind),
    Unknown,
}

impl DefectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectClass::Known(kind) => kind.as_str(),
            DefectClass::Unknown => "unknown",
        }
    }

    pub fn kind(&self) -> Option<DefectKind> {
        match self {
            DefectClass::Known(kind) => Some(*kind),
            DefectClass::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DefectClass::Unknown)
    }
}

impl fmt::Display for DefectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a detection ended up `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    /// Label is not one of the trained classes
    UnrecognizedLabel,
    /// Confidence below the unknown floor
    BelowConfidenceFloor,
}

/// Result of classifying one detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Label as reported by the detector
    pub label: String,
    pub class: DefectClass,
    pub confidence: f32,
    /// Recognized label, confidence between the unknown floor and the known threshold
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_reason: Option<UnknownReason>,
    /// Set for unknown classifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
