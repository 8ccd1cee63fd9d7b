use std::path::PathBuf;
use std::sync::Arc;

use metalgrade::compliance::{CellReason, GridLayout};
use metalgrade::*;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn make_engine() -> GridComplianceEngine {
    GridComplianceEngine::new(Arc::new(default_standards()), ComplianceConfig::default())
        .expect("Default config should be valid")
}

fn make_analyzer() -> Analyzer {
    Analyzer::new(Arc::new(default_standards()), ComplianceConfig::default())
        .expect("Default config should be valid")
}

fn material(metal: MetalType, thickness_mm: f64, grade: QualityGrade) -> MaterialSpec {
    MaterialSpec::new(metal, thickness_mm, grade).expect("Valid material")
}

fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> Region {
    Region::Box(BoundingBox { x1, y1, x2, y2 })
}

fn detection(label: &str, confidence: f32, region: Region) -> Detection {
    Detection {
        label: label.to_string(),
        confidence,
        region,
    }
}

#[test]
fn test_grid_partition_covers_image_exactly_once() {
    for (w, h, cell) in [(1000, 1000, 50), (1023, 767, 50), (17, 5, 4), (3, 3, 10)] {
        let grid = GridLayout::new(w, h, cell).unwrap();
        let mut owners = vec![0u8; w as usize * h as usize];
        for bounds in grid.cells() {
            for y in bounds.y..bounds.y + bounds.height {
                for x in bounds.x..bounds.x + bounds.width {
                    owners[y as usize * w as usize + x as usize] += 1;
                }
            }
        }
        assert!(
            owners.iter().all(|&n| n == 1),
            "{}x{} / {} px grid should assign every pixel to exactly one cell",
            w,
            h,
            cell
        );
    }
}

#[test]
fn test_single_cell_scratch_scenario() {
    let engine = make_engine();
    let spec = material(MetalType::CarbonSteel, 5.0, QualityGrade::B);

    let mut layers = DefectLayers::new(1000, 1000);
    // 25 x 25 px inside cell (10, 10): coverage 625 / 2500 = 0.25
    layers
        .add(DefectClass::Known(DefectKind::Scratches), &bbox(512.0, 512.0, 537.0, 537.0))
        .unwrap();

    let verdict = engine.evaluate(&layers, &spec, 10.0).unwrap();
    assert_eq!(verdict.grid.rows, 20);
    assert_eq!(verdict.grid.cols, 20);
    assert_eq!(verdict.grid.total_cells, 400);
    assert_eq!(verdict.overall, Verdict::Fail);
    assert_eq!(verdict.failing_cells.len(), 1);
    assert_eq!(verdict.grid.passed_cells(), 399);
    assert!(verdict.indeterminate_cells.is_empty());

    let cell = &verdict.failing_cells[0];
    assert_eq!((cell.row, cell.col), (10, 10));
    assert_eq!(cell.coverage_ratio, 0.25);
    assert_eq!(cell.local_threshold_ratio, 0.15);
    assert!(cell
        .reasons
        .contains(&CellReason::CoverageExceeded { ratio: 0.25, limit: 0.15 }));

    let classification = DefectClassifier::default().classify(&detection(
        "scratches",
        0.9,
        bbox(512.0, 512.0, 537.0, 537.0),
    ));
    let report = QualityReport::build(
        &[classification],
        verdict,
        &spec,
        &ComplianceConfig::default().scoring,
    );
    assert_eq!(report.score(), 95.0, "Only the single-cell penalty should apply");
    assert_eq!(report.overall_status(), Verdict::Fail);
}

#[test]
fn test_unknown_blob_scenario() {
    let report = make_analyzer()
        .analyze(&AnalysisRequest {
            width: 200,
            height: 200,
            pixels_per_mm: 10.0,
            material: material(MetalType::StainlessSteel, 3.0, QualityGrade::A),
            detections: vec![detection("unknown_blob", 0.92, bbox(20.0, 20.0, 26.0, 26.0))],
        })
        .unwrap();

    let summary = report.defect_summary();
    assert_eq!(summary.unknown_count, 1);
    assert!(summary.known.is_empty(), "No type name should be fabricated");
    assert_eq!(summary.classifications[0].class, DefectClass::Unknown);
    assert_eq!(report.unknown_defect_message(), Some(UNKNOWN_DEFECT_MESSAGE));
    assert!(UNKNOWN_DEFECT_MESSAGE.contains("not trained on this defect type"));

    let json = report.to_json().unwrap();
    assert!(json.contains("not trained on this defect type"));
    assert!(!json.contains("\"unknown_blob\":"), "Label must not become a type key");
}

#[test]
fn test_bracket_boundaries_resolve_upward() {
    let table = default_standards();
    let brackets = table.brackets().to_vec();

    for pair in brackets.windows(2) {
        let boundary = pair[0].max_mm.expect("Only the last bracket is open-ended");
        let below = table.resolve_bracket(boundary - 1e-9).unwrap();
        let at = table.resolve_bracket(boundary).unwrap();
        assert_eq!(table.bracket(below).unwrap().name, pair[0].name);
        assert_eq!(
            table.bracket(at).unwrap().name,
            pair[1].name,
            "{} mm should belong to the upper bracket",
            boundary
        );
    }

    let first = &brackets[0];
    assert_eq!(table.bracket(table.resolve_bracket(first.min_mm).unwrap()).unwrap().name, first.name);
    assert!(matches!(
        table.resolve_bracket(first.min_mm - 0.01),
        Err(QcError::Configuration(_))
    ));
}

#[test]
fn test_thickness_6_4_is_stable_and_uses_heavy_limits() {
    let table = default_standards();
    let first = table.resolve_bracket(6.4).unwrap();
    for _ in 0..100 {
        assert_eq!(table.resolve_bracket(6.4).unwrap(), first);
    }
    assert_eq!(table.bracket(first).unwrap().name, "heavy");
    assert_eq!(table.bracket(table.resolve_bracket(6.3999999).unwrap()).unwrap().name, "medium");
    assert_eq!(table.bracket(table.resolve_bracket(6.4000001).unwrap()).unwrap().name, "heavy");

    // A 1.7 mm scratch: over the 1.6 mm medium limit, under the 1.76 mm heavy limit
    let engine = make_engine();
    let mut layers = DefectLayers::new(100, 100);
    layers
        .add(DefectClass::Known(DefectKind::Scratches), &bbox(10.0, 10.0, 27.0, 11.0))
        .unwrap();

    let medium = engine
        .evaluate(&layers, &material(MetalType::CarbonSteel, 6.3999999, QualityGrade::B), 10.0)
        .unwrap();
    let heavy = engine
        .evaluate(&layers, &material(MetalType::CarbonSteel, 6.4, QualityGrade::B), 10.0)
        .unwrap();
    assert_eq!(medium.overall, Verdict::Fail);
    assert_eq!(heavy.overall, Verdict::Pass);
    assert_eq!(heavy.grid.bracket, "heavy");
}

#[test]
fn test_verdict_is_monotonic_in_defect_size() {
    let engine = make_engine();
    let spec = material(MetalType::CarbonSteel, 5.0, QualityGrade::B);

    let mut failed = false;
    for side in 1..=50 {
        let mut layers = DefectLayers::new(50, 50);
        layers
            .add(
                DefectClass::Known(DefectKind::Scratches),
                &bbox(0.0, 0.0, side as f32, side as f32),
            )
            .unwrap();
        let verdict = engine.evaluate(&layers, &spec, 10.0).unwrap();
        match verdict.overall {
            Verdict::Fail => failed = true,
            Verdict::Pass => assert!(!failed, "{} px defect passed after a smaller one failed", side),
        }
    }
    assert!(failed, "A full-cell defect must fail");
}

#[test]
fn test_image_fails_iff_some_cell_fails() {
    let engine = make_engine();
    let cases: Vec<(MetalType, Vec<(DefectClass, Region)>)> = vec![
        (MetalType::CarbonSteel, vec![]),
        (
            MetalType::CarbonSteel,
            vec![(DefectClass::Known(DefectKind::Pitted), bbox(5.0, 5.0, 9.0, 9.0))],
        ),
        (
            MetalType::Aluminum,
            vec![(DefectClass::Known(DefectKind::MtCrack), bbox(60.0, 60.0, 64.0, 64.0))],
        ),
        (
            MetalType::StainlessSteel,
            vec![
                (DefectClass::Known(DefectKind::Scratches), bbox(0.0, 0.0, 40.0, 2.0)),
                (DefectClass::Unknown, bbox(70.0, 70.0, 74.0, 74.0)),
            ],
        ),
        (
            MetalType::AlloySteel,
            vec![(DefectClass::Unknown, bbox(0.0, 50.0, 50.0, 100.0))],
        ),
    ];

    for (metal, defects) in cases {
        let mut layers = DefectLayers::new(100, 100);
        for (class, region) in &defects {
            layers.add(*class, region).unwrap();
        }
        let verdict = engine
            .evaluate(&layers, &material(metal, 5.0, QualityGrade::B), 10.0)
            .unwrap();
        assert_eq!(
            verdict.overall == Verdict::Fail,
            !verdict.failing_cells.is_empty(),
            "Image verdict disagrees with cell verdicts for {} {:?}",
            metal,
            defects
        );
        assert_eq!(verdict.grid.failed_cells as usize, verdict.failing_cells.len());
    }
}

#[test]
fn test_reference_index_over_full_space() {
    let selector = ReferenceSelector::default();
    for metal in MetalType::ALL {
        for grade in QualityGrade::ALL {
            let index = selector.select(metal, grade);
            assert!((1..=8).contains(&index), "{} {} -> {}", metal, grade, index);
            assert_eq!(index, selector.select(metal, grade));
        }
    }
}

#[test]
fn test_fixture_request_end_to_end() {
    let json = std::fs::read_to_string(fixture_path("scratch_request.json")).unwrap();
    let request: AnalysisRequest = serde_json::from_str(&json).unwrap();

    let report = make_analyzer().analyze(&request).unwrap();
    assert_eq!(report.overall_status(), Verdict::Fail);
    assert_eq!(report.compliance().failing_cells.len(), 1);
    assert_eq!(report.compliance().indeterminate_cells.len(), 1);
    assert_eq!(report.compliance().reference_index, 2);
    // 100 - one failing cell - one unknown detection
    assert_eq!(report.score(), 93.0);
    assert_eq!(report.rating(), QualityRating::Standard);
    assert_eq!(report.defect_summary().low_confidence_count, 1);
    assert_eq!(report.caveats().len(), 2);
}

#[test]
fn test_report_json_round_trip() {
    let json = std::fs::read_to_string(fixture_path("scratch_request.json")).unwrap();
    let request: AnalysisRequest = serde_json::from_str(&json).unwrap();
    let report = make_analyzer().analyze(&request).unwrap();

    let exported = report.to_json().unwrap();
    let reparsed = QualityReport::from_json(&exported).unwrap();
    assert_eq!(reparsed, report, "Report changed after JSON round-trip");
    assert_eq!(reparsed.to_json().unwrap(), exported);
}

#[test]
fn test_edited_report_json_is_rejected() {
    let json = std::fs::read_to_string(fixture_path("scratch_request.json")).unwrap();
    let request: AnalysisRequest = serde_json::from_str(&json).unwrap();
    let exported = make_analyzer().analyze(&request).unwrap().to_json().unwrap();
    assert!(exported.contains("\"overall_status\": \"FAIL\""));

    let flipped = exported.replace("\"overall_status\": \"FAIL\"", "\"overall_status\": \"PASS\"");
    let err = QualityReport::from_json(&flipped).unwrap_err();
    assert!(matches!(err, QcError::Input(_)), "Expected InputError, got {:?}", err);

    let inflated = exported.replace("\"score\": 93.0", "\"score\": 100.0");
    assert_ne!(inflated, exported);
    assert!(QualityReport::from_json(&inflated).is_err(), "Score must match its breakdown");
}

#[test]
fn test_custom_standards_fixture() {
    let table = load_standards(&fixture_path("custom_standards.toml")).unwrap();
    assert_eq!(table.standard(), "Plant QA 7");

    let sheet = table
        .lookup(MetalType::Aluminum, 3.0, QualityGrade::B, DefectKind::Scratches)
        .unwrap()
        .unwrap();
    let plate = table
        .lookup(MetalType::Aluminum, 10.0, QualityGrade::B, DefectKind::Scratches)
        .unwrap()
        .unwrap();
    assert_eq!(sheet.max_size_mm, 1.0);
    assert_eq!(plate.max_size_mm, 1.5);

    assert_eq!(
        table
            .lookup(MetalType::Aluminum, 3.0, QualityGrade::B, DefectKind::MtCrack)
            .unwrap(),
        None,
        "Crack limits only exist for plate"
    );
    assert!(table
        .lookup(MetalType::CarbonSteel, 3.0, QualityGrade::B, DefectKind::Scratches)
        .unwrap()
        .is_none());
}

#[test]
fn test_custom_standards_drive_engine() {
    let table = load_standards(&fixture_path("custom_standards.toml")).unwrap();
    let engine = GridComplianceEngine::new(Arc::new(table), ComplianceConfig::default()).unwrap();

    let mut layers = DefectLayers::new(100, 100);
    // 12 px = 1.2 mm: over the 1.0 mm sheet limit, under the 1.5 mm plate limit
    layers
        .add(DefectClass::Known(DefectKind::Scratches), &bbox(0.0, 0.0, 12.0, 1.0))
        .unwrap();

    let sheet = engine
        .evaluate(&layers, &material(MetalType::Aluminum, 2.0, QualityGrade::B), 10.0)
        .unwrap();
    let plate = engine
        .evaluate(&layers, &material(MetalType::Aluminum, 12.0, QualityGrade::B), 10.0)
        .unwrap();
    assert_eq!(sheet.overall, Verdict::Fail);
    assert_eq!(plate.overall, Verdict::Pass);
}

#[test]
fn test_mask_dimension_mismatch_is_input_error() {
    let request = AnalysisRequest {
        width: 64,
        height: 64,
        pixels_per_mm: 5.0,
        material: material(MetalType::Aluminum, 2.0, QualityGrade::C),
        detections: vec![detection("pitted", 0.9, Region::Mask(DefectMask::new(64, 32)))],
    };
    let err = make_analyzer().analyze(&request).unwrap_err();
    assert!(matches!(err, QcError::Input(_)), "got {:?}", err);
}

#[test]
fn test_thickness_below_every_bracket_is_configuration_error() {
    let request = AnalysisRequest {
        width: 64,
        height: 64,
        pixels_per_mm: 5.0,
        material: material(MetalType::CarbonSteel, 1.0, QualityGrade::B),
        detections: vec![],
    };
    let err = make_analyzer().analyze(&request).unwrap_err();
    assert!(matches!(err, QcError::Configuration(_)), "got {:?}", err);
}

#[test]
fn test_mask_region_from_gray_image() {
    let mut img = image::GrayImage::new(100, 100);
    for x in 10..40 {
        img.put_pixel(x, 20, image::Luma([255]));
    }
    let mask = DefectMask::from_gray_image(&img);

    let report = make_analyzer()
        .analyze(&AnalysisRequest {
            width: 100,
            height: 100,
            pixels_per_mm: 10.0,
            material: material(MetalType::CarbonSteel, 5.0, QualityGrade::B),
            detections: vec![detection("mt_crack", 0.95, Region::Mask(mask.clone()))],
        })
        .unwrap();

    // 30 px = 3.0 mm crack against a 0.8 mm grade B limit
    assert_eq!(report.overall_status(), Verdict::Fail);
    assert_eq!(report.defect_overlay(), Some(&mask));
    assert!(report
        .recommendations()
        .iter()
        .any(|r| r.contains("welding and forming")));
}
