pub mod analyzer;
pub mod classifier;
pub mod compliance;
pub mod config;
pub mod detection;
mod error;
pub mod mask;
pub mod material;
pub mod reference;
pub mod report;
pub mod standards;

pub use analyzer::{AnalysisRequest, Analyzer};
pub use classifier::{ClassificationResult, DefectClass, DefectClassifier, DefectKind, UNKNOWN_DEFECT_MESSAGE};
pub use compliance::{CellVerdict, ComplianceVerdict, DefectLayers, GridComplianceEngine, Verdict};
pub use config::ComplianceConfig;
pub use detection::{BoundingBox, Detection, Region};
pub use error::QcError;
pub use mask::DefectMask;
pub use material::{MaterialSpec, MetalType, QualityGrade};
pub use reference::ReferenceSelector;
pub use report::{QualityRating, QualityReport, RiskAssessment, RiskLevel};
pub use standards::{default_standards, load_standards, StandardsTable};

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
