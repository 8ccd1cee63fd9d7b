//! Supporting types for the quality report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassificationResult, DefectKind};
use crate::compliance::{ComplianceVerdict, Verdict};

/// Failure rate above which grid failures count as widespread.
pub(crate) const WIDESPREAD_FAILURE_RATE: f64 = 0.1;

/// Detection count above which defect density is a risk factor.
const HIGH_DEFECT_COUNT: u32 = 10;

/// Quality band derived from the report score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityRating {
    Premium,
    Standard,
    Acceptable,
    Marginal,
    Rejected,
}

impl QualityRating {
    /// Premium >= 95, Standard >= 85, Acceptable >= 70, Marginal >= 50.
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            QualityRating::Premium
        } else if score >= 85.0 {
            QualityRating::Standard
        } else if score >= 70.0 {
            QualityRating::Acceptable
        } else if score >= 50.0 {
            QualityRating::Marginal
        } else {
            QualityRating::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityRating::Premium => "PREMIUM",
            QualityRating::Standard => "STANDARD",
            QualityRating::Acceptable => "ACCEPTABLE",
            QualityRating::Marginal => "MARGINAL",
            QualityRating::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detections of one trained defect kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectTally {
    pub kind: DefectKind,
    pub count: u32,
    pub max_confidence: f32,
    pub low_confidence_count: u32,
}

/// What the classifier made of the image's detections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefectSummary {
    pub total_detections: u32,
    /// Known kinds, ordered by kind
    pub known: Vec<DefectTally>,
    pub unknown_count: u32,
    pub low_confidence_count: u32,
    pub classifications: Vec<ClassificationResult>,
}

impl DefectSummary {
    pub fn from_classifications(classifications: &[ClassificationResult]) -> Self {
        let mut known: Vec<DefectTally> = Vec::new();
        let mut unknown_count = 0;
        let mut low_confidence_count = 0;

        for result in classifications {
            if result.low_confidence {
                low_confidence_count += 1;
            }
            let Some(kind) = result.class.kind() else {
                unknown_count += 1;
                continue;
            };
            match known.iter_mut().find(|t| t.kind == kind) {
                Some(tally) => {
                    tally.count += 1;
                    tally.max_confidence = tally.max_confidence.max(result.confidence);
                    tally.low_confidence_count += u32::from(result.low_confidence);
                }
                None => known.push(DefectTally {
                    kind,
                    count: 1,
                    max_confidence: result.confidence,
                    low_confidence_count: u32::from(result.low_confidence),
                }),
            }
        }
        known.sort_by_key(|t| t.kind);

        Self {
            total_detections: classifications.len() as u32,
            known,
            unknown_count,
            low_confidence_count,
            classifications: classifications.to_vec(),
        }
    }

    pub fn has_unknown(&self) -> bool {
        self.unknown_count > 0
    }
}

/// Usage risk derived from the report score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Minimal >= 90, Low >= 75, Moderate >= 60, High >= 40.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            RiskLevel::Minimal
        } else if score >= 75.0 {
            RiskLevel::Low
        } else if score >= 60.0 {
            RiskLevel::Moderate
        } else if score >= 40.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn usage_recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "APPROVED - Safe for all applications",
            RiskLevel::Low => "APPROVED - Monitor during use",
            RiskLevel::Moderate => "CONDITIONAL - Limited applications only",
            RiskLevel::High => "RESTRICTED - Critical applications prohibited",
            RiskLevel::Critical => "REJECTED - Not suitable for any application",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Minimal => "MINIMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        })
    }
}

/// Risk of putting the inspected material into service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub usage_recommendation: String,
    /// Never empty; a single "no significant risk" line when nothing applies
    pub factors: Vec<String>,
}

impl RiskAssessment {
    pub fn assess(score: f64, compliance: &ComplianceVerdict, summary: &DefectSummary) -> Self {
        let level = RiskLevel::from_score(score);
        let mut factors = Vec::new();

        if summary.total_detections > HIGH_DEFECT_COUNT {
            factors.push("High defect density may compromise structural integrity".to_string());
        }
        if compliance.overall == Verdict::Fail {
            factors.push("Non-compliance with the sizing standard increases failure risk".to_string());
        }
        if compliance.grid.failure_rate > WIDESPREAD_FAILURE_RATE {
            factors.push("Spatial quality issues may cause localized failures".to_string());
        }
        if summary.unknown_count > 0 {
            factors.push(format!(
                "{} unknown defect pattern(s) require expert evaluation",
                summary.unknown_count
            ));
        }
        if factors.is_empty() {
            factors.push("No significant risk factors identified".to_string());
        }

        Self {
            level,
            usage_recommendation: level.usage_recommendation().to_string(),
            factors,
        }
    }
}

/// One deduction from the starting score of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub label: String,
    pub count: u32,
    pub penalty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{DefectClass, UnknownReason, UNKNOWN_DEFECT_MESSAGE};

    fn result(label: &str, class: DefectClass, confidence: f32, low: bool) -> ClassificationResult {
        ClassificationResult {
            label: label.to_string(),
            class,
            confidence,
            low_confidence: low,
            unknown_reason: class.is_unknown().then_some(UnknownReason::UnrecognizedLabel),
            message: class.is_unknown().then(|| UNKNOWN_DEFECT_MESSAGE.to_string()),
        }
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(QualityRating::from_score(100.0), QualityRating::Premium);
        assert_eq!(QualityRating::from_score(95.0), QualityRating::Premium);
        assert_eq!(QualityRating::from_score(94.9), QualityRating::Standard);
        assert_eq!(QualityRating::from_score(85.0), QualityRating::Standard);
        assert_eq!(QualityRating::from_score(70.0), QualityRating::Acceptable);
        assert_eq!(QualityRating::from_score(50.0), QualityRating::Marginal);
        assert_eq!(QualityRating::from_score(49.9), QualityRating::Rejected);
        assert_eq!(QualityRating::from_score(0.0), QualityRating::Rejected);
    }

    #[test]
    fn test_summary_tallies() {
        let scratches = DefectClass::Known(DefectKind::Scratches);
        let pitted = DefectClass::Known(DefectKind::Pitted);
        let summary = DefectSummary::from_classifications(&[
            result("scratches", scratches, 0.9, false),
            result("Scratches", scratches, 0.5, true),
            result("pitted", pitted, 0.8, false),
            result("unknown_blob", DefectClass::Unknown, 0.92, false),
        ]);

        assert_eq!(summary.total_detections, 4);
        assert_eq!(summary.unknown_count, 1);
        assert_eq!(summary.low_confidence_count, 1);
        assert_eq!(summary.known.len(), 2);
        assert_eq!(summary.known[0].kind, DefectKind::Pitted, "Tallies sorted by kind");
        let scratch_tally = &summary.known[1];
        assert_eq!(scratch_tally.count, 2);
        assert_eq!(scratch_tally.max_confidence, 0.9);
        assert_eq!(scratch_tally.low_confidence_count, 1);
        assert!(summary.has_unknown());
    }

    fn compliance(overall: Verdict, failed_cells: u32) -> ComplianceVerdict {
        use crate::compliance::{GridMetrics, GridSummary};
        ComplianceVerdict {
            overall,
            failing_cells: Vec::new(),
            indeterminate_cells: Vec::new(),
            reference_index: 1,
            grid: GridSummary {
                rows: 10,
                cols: 10,
                cell_size_px: 50,
                bracket: "medium".to_string(),
                total_cells: 100,
                cells_with_defects: failed_cells,
                failed_cells,
                indeterminate_count: 0,
                failure_rate: failed_cells as f64 / 100.0,
                metrics: GridMetrics {
                    overall_quality: 1.0,
                    defect_density: 0.0,
                    uniformity_score: 1.0,
                },
            },
        }
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(90.0), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(89.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(75.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(74.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(39.9), RiskLevel::Critical);
    }

    #[test]
    fn test_clean_material_has_no_risk_factors() {
        let risk = RiskAssessment::assess(100.0, &compliance(Verdict::Pass, 0), &DefectSummary::default());
        assert_eq!(risk.level, RiskLevel::Minimal);
        assert_eq!(risk.usage_recommendation, "APPROVED - Safe for all applications");
        assert_eq!(risk.factors, vec!["No significant risk factors identified".to_string()]);
    }

    #[test]
    fn test_risk_factor_triggers() {
        let scratches = DefectClass::Known(DefectKind::Scratches);
        let mut results: Vec<_> = (0..11).map(|_| result("scratches", scratches, 0.9, false)).collect();
        results.push(result("unknown_blob", DefectClass::Unknown, 0.92, false));
        let summary = DefectSummary::from_classifications(&results);

        let risk = RiskAssessment::assess(50.0, &compliance(Verdict::Fail, 20), &summary);
        assert_eq!(risk.level, RiskLevel::High);
        assert_eq!(risk.factors.len(), 4, "All four factors should fire: {:?}", risk.factors);
        assert!(risk.factors[0].contains("defect density"));
        assert!(risk.factors[1].contains("Non-compliance"));
        assert!(risk.factors[2].contains("Spatial"));
        assert_eq!(risk.factors[3], "1 unknown defect pattern(s) require expert evaluation");
    }

    #[test]
    fn test_risk_factor_thresholds_are_exclusive() {
        let scratches = DefectClass::Known(DefectKind::Scratches);
        let results: Vec<_> = (0..10).map(|_| result("scratches", scratches, 0.9, false)).collect();
        let summary = DefectSummary::from_classifications(&results);

        // 10 detections and a 10% failure rate sit on the thresholds
        let risk = RiskAssessment::assess(95.0, &compliance(Verdict::Fail, 10), &summary);
        assert_eq!(risk.factors.len(), 1);
        assert!(risk.factors[0].contains("Non-compliance"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DefectSummary::from_classifications(&[]);
        assert_eq!(summary, DefectSummary::default());
    }
}
