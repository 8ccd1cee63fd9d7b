//! End-to-end analysis of one image's detections.
//!
//! Validates the request, classifies detections, rasterizes them into
//! per-class layers, runs the grid compliance engine and assembles the
//! report. Any input or configuration error aborts the analysis; no partial
//! report is produced.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::DefectClassifier;
use crate::compliance::{DefectLayers, GridComplianceEngine};
use crate::config::ComplianceConfig;
use crate::detection::Detection;
use crate::error::QcError;
use crate::mask::check_mask_size;
use crate::material::MaterialSpec;
use crate::report::QualityReport;
use crate::standards::StandardsTable;

/// Everything needed to analyze one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Image scale
    pub pixels_per_mm: f64,
    pub material: MaterialSpec,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), QcError> {
        if self.width == 0 || self.height == 0 {
            return Err(QcError::input(format!(
                "Image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        check_mask_size(self.width, self.height)?;
        if !self.pixels_per_mm.is_finite() || self.pixels_per_mm <= 0.0 {
            return Err(QcError::input(format!(
                "pixels_per_mm must be a positive number, got {}",
                self.pixels_per_mm
            )));
        }
        self.material.validate()?;
        for detection in &self.detections {
            detection.validate(self.width, self.height)?;
        }
        Ok(())
    }
}

/// Classifier, compliance engine and scoring policy behind one call.
pub struct Analyzer {
    classifier: DefectClassifier,
    engine: GridComplianceEngine,
}

impl Analyzer {
    /// Create an analyzer. Fails with `ConfigurationError` if the config is
    /// inconsistent.
    pub fn new(standards: Arc<StandardsTable>, config: ComplianceConfig) -> Result<Self, QcError> {
        Ok(Self {
            classifier: DefectClassifier::new(config.classification),
            engine: GridComplianceEngine::new(standards, config)?,
        })
    }

    pub fn config(&self) -> &ComplianceConfig {
        self.engine.config()
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<QualityReport, QcError> {
        request.validate()?;

        let classifications = self.classifier.classify_all(&request.detections);

        let mut layers = DefectLayers::new(request.width, request.height);
        for (detection, result) in request.detections.iter().zip(&classifications) {
            layers.add(result.class, &detection.region)?;
        }
        debug!(
            "Classified {} detections into {} layers",
            classifications.len(),
            layers.iter().count()
        );

        let verdict = self
            .engine
            .evaluate(&layers, &request.material, request.pixels_per_mm)?;
        let overlay = layers.union();

        Ok(QualityReport::build(
            &classifications,
            verdict,
            &request.material,
            &self.config().scoring,
        )
        .with_defect_overlay(overlay))
    }

    /// Analyze many images in parallel. Results keep the request order.
    pub fn analyze_batch(&self, requests: &[AnalysisRequest]) -> Vec<Result<QualityReport, QcError>> {
        info!("Analyzing batch of {} images", requests.len());
        requests.par_iter().map(|request| self.analyze(request)).collect()
    }
}
