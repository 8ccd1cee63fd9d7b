//! Confidence-policy classifier for raw detections.

use tracing::debug;

use crate::config::ClassificationThresholds;
use crate::detection::Detection;

use super::types::*;

/// Maps detector output onto the closed defect-kind set.
///
/// Three outcomes, in order of precedence:
/// - unrecognized label, or confidence below the unknown floor: `Unknown`
/// - confidence at or above the known threshold: confident classification
/// - anything in between: classified, but flagged `low_confidence`
#[derive(Debug, Clone, Copy)]
pub struct DefectClassifier {
    thresholds: ClassificationThresholds,
}

impl DefectClassifier {
    pub fn new(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    pub fn classify(&self, detection: &Detection) -> ClassificationResult {
        let confidence = detection.confidence;

        let unknown = |reason: UnknownReason| ClassificationResult {
            label: detection.label.clone(),
            class: DefectClass::Unknown,
            confidence,
            low_confidence: false,
            unknown_reason: Some(reason),
            message: Some(UNKNOWN_DEFECT_MESSAGE.to_string()),
        };

        let Some(kind) = DefectKind::from_label(&detection.label) else {
            debug!(
                "Label '{}' is not a trained defect class (confidence {:.2})",
                detection.label, confidence
            );
            return unknown(UnknownReason::UnrecognizedLabel);
        };

        if confidence < self.thresholds.unknown_threshold {
            debug!(
                "Detection '{}' below unknown floor: {:.2} < {:.2}",
                detection.label, confidence, self.thresholds.unknown_threshold
            );
            return unknown(UnknownReason::BelowConfidenceFloor);
        }

        ClassificationResult {
            label: detection.label.clone(),
            class: DefectClass::Known(kind),
            confidence,
            low_confidence: confidence < self.thresholds.known_threshold,
            unknown_reason: None,
            message: None,
        }
    }

    pub fn classify_all(&self, detections: &[Detection]) -> Vec<ClassificationResult> {
        detections.iter().map(|d| self.classify(d)).collect()
    }
}

impl Default for DefectClassifier {
    fn default() -> Self {
        Self::new(ClassificationThresholds::default())
    }
}
