//! Quality report assembly and JSON exchange.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{ClassificationResult, DefectClass, DefectKind, UNKNOWN_DEFECT_MESSAGE};
use crate::compliance::{ComplianceVerdict, Verdict};
use crate::config::ScoringConfig;
use crate::error::QcError;
use crate::mask::DefectMask;
use crate::material::MaterialSpec;

use super::types::*;

/// Final, immutable inspection result for one image.
///
/// Built once from the classifications and the compliance verdict; fields are
/// read through getters only. `overall_status` is the compliance verdict.
/// Deserializing re-checks every derived field, so a document whose status,
/// score, rating or risk disagrees with its own data is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReportRecord")]
pub struct QualityReport {
    score: f64,
    rating: QualityRating,
    risk: RiskAssessment,
    overall_status: Verdict,
    material: MaterialSpec,
    defect_summary: DefectSummary,
    compliance: ComplianceVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unknown_defect_message: Option<String>,
    caveats: Vec<String>,
    recommendations: Vec<String>,
    score_breakdown: Vec<ScoreComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defect_overlay: Option<DefectMask>,
}

/// Wire form of a [`QualityReport`], checked before it becomes one.
#[derive(Deserialize)]
struct ReportRecord {
    score: f64,
    rating: QualityRating,
    risk: RiskAssessment,
    overall_status: Verdict,
    material: MaterialSpec,
    defect_summary: DefectSummary,
    compliance: ComplianceVerdict,
    #[serde(default)]
    unknown_defect_message: Option<String>,
    caveats: Vec<String>,
    recommendations: Vec<String>,
    score_breakdown: Vec<ScoreComponent>,
    #[serde(default)]
    defect_overlay: Option<DefectMask>,
}

impl TryFrom<ReportRecord> for QualityReport {
    type Error = QcError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        let compliance = &record.compliance;
        let compliance_overall = if compliance.failing_cells.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        if compliance.overall != compliance_overall {
            return Err(QcError::input(format!(
                "Compliance verdict {} disagrees with {} failing cells",
                compliance.overall,
                compliance.failing_cells.len()
            )));
        }
        if record.overall_status != compliance.overall {
            return Err(QcError::input(format!(
                "overall_status {} disagrees with compliance verdict {}",
                record.overall_status, compliance.overall
            )));
        }

        let score = score_from(&record.score_breakdown);
        if (record.score - score).abs() > SCORE_TOLERANCE {
            return Err(QcError::input(format!(
                "Score {} does not match its breakdown ({})",
                record.score, score
            )));
        }
        if record.rating != QualityRating::from_score(record.score) {
            return Err(QcError::input(format!(
                "Rating {} does not match score {}",
                record.rating, record.score
            )));
        }
        if record.risk != RiskAssessment::assess(record.score, compliance, &record.defect_summary) {
            return Err(QcError::input(format!(
                "Risk assessment {} does not match the report data",
                record.risk.level
            )));
        }
        if record.unknown_defect_message.is_some() != record.defect_summary.has_unknown() {
            return Err(QcError::input(
                "unknown_defect_message must be present exactly when unknown defects are",
            ));
        }

        Ok(Self {
            score: record.score,
            rating: record.rating,
            risk: record.risk,
            overall_status: record.overall_status,
            material: record.material,
            defect_summary: record.defect_summary,
            compliance: record.compliance,
            unknown_defect_message: record.unknown_defect_message,
            caveats: record.caveats,
            recommendations: record.recommendations,
            score_breakdown: record.score_breakdown,
            defect_overlay: record.defect_overlay,
        })
    }
}

/// Slack allowed when re-deriving a parsed score.
const SCORE_TOLERANCE: f64 = 1e-9;

impl QualityReport {
    /// Assemble a report. Pure: the same inputs always give an equal report.
    pub fn build(
        classifications: &[ClassificationResult],
        compliance: ComplianceVerdict,
        material: &MaterialSpec,
        scoring: &ScoringConfig,
    ) -> Self {
        let defect_summary = DefectSummary::from_classifications(classifications);
        let score_breakdown = score_components(&compliance, &defect_summary, scoring);
        let score = score_from(&score_breakdown);
        let rating = QualityRating::from_score(score);
        let risk = RiskAssessment::assess(score, &compliance, &defect_summary);
        let overall_status = compliance.overall;

        let unknown_defect_message = defect_summary
            .has_unknown()
            .then(|| UNKNOWN_DEFECT_MESSAGE.to_string());
        let caveats = caveats(&compliance, &defect_summary);
        let recommendations = recommendations(&compliance, &defect_summary, material, rating);

        info!(
            "Quality report: {} score {:.1} ({}), {} detections, {} unknown",
            overall_status, score, rating, defect_summary.total_detections, defect_summary.unknown_count
        );

        Self {
            score,
            rating,
            risk,
            overall_status,
            material: *material,
            defect_summary,
            compliance,
            unknown_defect_message,
            caveats,
            recommendations,
            score_breakdown,
            defect_overlay: None,
        }
    }

    /// Attach the combined defect mask for highlighted-image rendering.
    pub fn with_defect_overlay(mut self, mask: DefectMask) -> Self {
        self.defect_overlay = Some(mask);
        self
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn rating(&self) -> QualityRating {
        self.rating
    }

    pub fn risk(&self) -> &RiskAssessment {
        &self.risk
    }

    pub fn overall_status(&self) -> Verdict {
        self.overall_status
    }

    pub fn material(&self) -> &MaterialSpec {
        &self.material
    }

    pub fn defect_summary(&self) -> &DefectSummary {
        &self.defect_summary
    }

    pub fn compliance(&self) -> &ComplianceVerdict {
        &self.compliance
    }

    pub fn unknown_defect_message(&self) -> Option<&str> {
        self.unknown_defect_message.as_deref()
    }

    pub fn caveats(&self) -> &[String] {
        &self.caveats
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn score_breakdown(&self) -> &[ScoreComponent] {
        &self.score_breakdown
    }

    pub fn defect_overlay(&self) -> Option<&DefectMask> {
        self.defect_overlay.as_ref()
    }

    pub fn to_json(&self) -> Result<String, QcError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| QcError::input(format!("Failed to serialize report: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, QcError> {
        serde_json::from_str(json).map_err(|e| QcError::input(format!("Invalid report JSON: {}", e)))
    }
}

fn score_from(components: &[ScoreComponent]) -> f64 {
    (100.0 - components.iter().map(|c| c.penalty).sum::<f64>()).clamp(0.0, 100.0)
}

fn score_components(
    compliance: &ComplianceVerdict,
    summary: &DefectSummary,
    scoring: &ScoringConfig,
) -> Vec<ScoreComponent> {
    let mut components = Vec::new();

    let failed = compliance.grid.failed_cells;
    if failed > 0 {
        components.push(ScoreComponent {
            label: "failing grid cells".to_string(),
            count: failed,
            penalty: (failed as f64 * scoring.fail_cell_penalty).min(scoring.max_fail_penalty),
        });
    }

    let unknown = summary.unknown_count;
    if unknown > 0 {
        components.push(ScoreComponent {
            label: "unknown defects".to_string(),
            count: unknown,
            penalty: (unknown as f64 * scoring.unknown_penalty).min(scoring.max_unknown_penalty),
        });
    }

    components
}

fn caveats(compliance: &ComplianceVerdict, summary: &DefectSummary) -> Vec<String> {
    let mut caveats = Vec::new();

    let mut unstandardized: BTreeMap<DefectClass, u32> = BTreeMap::new();
    for cell in &compliance.indeterminate_cells {
        if let Some(class) = cell.dominant_defect {
            *unstandardized.entry(class).or_default() += 1;
        }
    }
    for (class, cells) in unstandardized {
        caveats.push(format!(
            "{} cell(s) dominated by {} have no applicable standard and were not graded",
            cells, class
        ));
    }

    for result in summary.classifications.iter().filter(|r| r.low_confidence) {
        caveats.push(format!(
            "Detection '{}' classified with low confidence ({:.2})",
            result.label, result.confidence
        ));
    }

    caveats
}

fn recommendations(
    compliance: &ComplianceVerdict,
    summary: &DefectSummary,
    material: &MaterialSpec,
    rating: QualityRating,
) -> Vec<String> {
    let mut recs = Vec::new();

    match compliance.overall {
        Verdict::Fail => {
            recs.push(format!(
                "REJECTION: Material fails {} limits for {} {} mm - reject or downgrade",
                material.quality_grade,
                material.metal_type.display_name(),
                material.thickness_mm
            ));
        }
        Verdict::Pass => recs.push(
            match rating {
                QualityRating::Premium => "APPROVAL: Material approved for production use - suitable as a reference sample",
                QualityRating::Standard => "APPROVAL: Material approved for production use",
                QualityRating::Acceptable => "CONDITIONAL: Approve with increased inspection frequency",
                QualityRating::Marginal => "ENGINEERING REVIEW: Requires detailed analysis before approval",
                QualityRating::Rejected => "REJECTION: Material does not meet minimum quality standards",
            }
            .to_string(),
        ),
    }

    if compliance.grid.failure_rate > WIDESPREAD_FAILURE_RATE {
        recs.push("SPATIAL QUALITY: Widespread grid failures - investigate surface treatment".to_string());
    }

    let mut hints: Vec<&str> = Vec::new();
    let mut failing_kinds: Vec<DefectKind> = compliance
        .failing_cells
        .iter()
        .filter_map(|c| c.dominant_defect.and_then(|d| d.kind()))
        .collect();
    failing_kinds.sort();
    failing_kinds.dedup();
    for kind in failing_kinds {
        let hint = process_hint(kind);
        if !hints.contains(&hint) {
            hints.push(hint);
        }
    }
    recs.extend(hints.into_iter().map(str::to_string));

    if !compliance.indeterminate_cells.is_empty() {
        recs.push(format!(
            "MANUAL INSPECTION: {} cell(s) have no applicable standard",
            compliance.indeterminate_cells.len()
        ));
    }

    if summary.has_unknown() {
        recs.push("CLASSIFICATION: Unknown defect patterns detected - expert analysis required".to_string());
    }

    recs
}

fn process_hint(kind: DefectKind) -> &'static str {
    use DefectKind::*;
    match kind {
        MtCrack | MtBreak | WeldingLine => "PROCESS: Cracks or weld defects - review welding and forming processes",
        OilSpot | WaterSpot | SilkSpot | Patches => "PROCESS: Surface contamination - improve cleaning and handling",
        Inclusion => "PROCESS: Inclusions - review raw material sourcing and melt quality",
        Pitted | RolledPit | Rolled | Scratches | Crazing | Crease | CrescentGap | WaistFolding
        | PunchingHole => "PROCESS: Mechanical surface damage - inspect rolling and handling equipment",
    }
}
