mod common;

use crop_advisor::config::ModelsConfig;
use crop_advisor::features::{FeatureVector, FEATURE_NAMES, FEATURE_RANGES};
use crop_advisor::models::{InferencePipeline, RandomForest, StandardScaler};
use crop_advisor::{ArtifactKind, PipelineError};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn load(root: &Path, config: &ModelsConfig) -> InferencePipeline {
    InferencePipeline::load_from_root(config, root).unwrap()
}

fn fixture() -> (TempDir, InferencePipeline) {
    let dir = TempDir::new().unwrap();
    let config = common::install(dir.path());
    let pipeline = load(dir.path(), &config);
    (dir, pipeline)
}

/// Deterministic sweep over the guidance ranges, plus a few extremes
fn sweep() -> Vec<FeatureVector> {
    let mut rows = Vec::new();
    for step in 0..=10 {
        let t = step as f64 / 10.0;
        let v: Vec<f64> = FEATURE_RANGES
            .iter()
            .enumerate()
            .map(|(i, r)| {
                // offset each column so rows are not all on the diagonal
                let u = (t + i as f64 * 0.37) % 1.0;
                r.min + u * (r.max - r.min)
            })
            .collect();
        rows.push(FeatureVector::from_slice(&v).unwrap());
    }
    rows.push(FeatureVector::new(0.0, 0.0, 0.0, -40.0, 0.0, 0.0, 0.0));
    rows.push(FeatureVector::new(1e6, 1e6, 1e6, 1e6, 1e6, 1e6, 1e6));
    rows
}

#[test]
fn rice_exemplar_decodes_to_rice() {
    let (_dir, pipeline) = fixture();
    let result = pipeline.predict(&FeatureVector::rice_exemplar()).unwrap();
    assert_eq!(result.crop_name, "rice");
    let confidence = result.confidence.unwrap();
    assert!((confidence - 29.0 / 30.0).abs() < 1e-9);
}

#[test]
fn predictions_are_known_labels() {
    let (_dir, pipeline) = fixture();
    let known: HashSet<&str> = pipeline.class_names().iter().map(String::as_str).collect();
    for row in sweep() {
        let result = pipeline.predict(&row).unwrap();
        assert!(known.contains(result.crop_name.as_str()), "{}", result.crop_name);
    }
}

#[test]
fn confidence_is_max_probability() {
    let dir = TempDir::new().unwrap();
    let config = common::install(dir.path());
    let pipeline = load(dir.path(), &config);

    let scaler = StandardScaler::from_json(
        &serde_json::to_vec(&common::scaler()).unwrap(),
        Path::new("scaler.json"),
    )
    .unwrap();
    let forest = RandomForest::from_json(
        &serde_json::to_vec(&common::forest()).unwrap(),
        Path::new("rf_model.json"),
    )
    .unwrap();

    for row in sweep() {
        let proba = forest.predict_proba(&scaler.transform(&row.to_array()));
        let expected = proba.iter().copied().fold(f64::MIN, f64::max);
        let confidence = pipeline.predict(&row).unwrap().confidence.unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert_eq!(confidence, expected);
    }
}

#[test]
fn importances_are_ranked_and_complete() {
    let (_dir, pipeline) = fixture();
    assert!(pipeline.capabilities().feature_importances);

    let ranked = pipeline
        .predict(&FeatureVector::rice_exemplar())
        .unwrap()
        .feature_importances
        .unwrap();

    assert_eq!(ranked.len(), FEATURE_NAMES.len());
    let names: HashSet<&str> = ranked.iter().map(|r| r.feature).collect();
    assert_eq!(names, FEATURE_NAMES.iter().copied().collect());
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(ranked.iter().all(|r| r.score >= 0.0));

    let total: f64 = ranked.iter().map(|r| r.score).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(ranked[0].feature, "rainfall");
}

#[test]
fn predict_is_idempotent() {
    let (_dir, pipeline) = fixture();
    for row in sweep() {
        assert_eq!(pipeline.predict(&row).unwrap(), pipeline.predict(&row).unwrap());
    }
}

#[test]
fn out_of_range_values_still_predict() {
    let (_dir, pipeline) = fixture();
    let mut row = FeatureVector::rice_exemplar();
    row.ph = 20.0;
    assert_eq!(row.out_of_range(), vec!["ph"]);
    assert_eq!(pipeline.predict(&row).unwrap().crop_name, "rice");
}

#[test]
fn malformed_vectors_are_rejected() {
    let (_dir, pipeline) = fixture();
    assert!(matches!(
        pipeline.predict_values(&[90.0, 42.0, 43.0, 20.8, 82.0, 6.5]),
        Err(PipelineError::InvalidInput(_))
    ));

    let mut row = FeatureVector::rice_exemplar();
    row.humidity = f64::INFINITY;
    assert!(matches!(pipeline.predict(&row), Err(PipelineError::InvalidInput(_))));
}

#[test]
fn batch_matches_single_predictions() {
    let (_dir, pipeline) = fixture();
    let rows = sweep();
    let batch = pipeline.predict_batch(&rows);
    assert_eq!(batch.len(), rows.len());
    for (row, result) in rows.iter().zip(batch) {
        assert_eq!(result.unwrap(), pipeline.predict(row).unwrap());
    }
}

#[test]
fn missing_artifacts_fail_startup() {
    let cases = [
        (ArtifactKind::Scaler, "scaler.json"),
        (ArtifactKind::Classifier, "rf_model.json"),
        (ArtifactKind::LabelEncoder, "label_encoder.json"),
    ];

    for (kind, file) in cases {
        let dir = TempDir::new().unwrap();
        let config = common::install(dir.path());
        let path = dir.path().join("models").join(file);
        fs::remove_file(&path).unwrap();

        match InferencePipeline::load_from_root(&config, dir.path()) {
            Err(PipelineError::ArtifactNotFound { artifact, path: missing }) => {
                assert_eq!(artifact, kind);
                assert_eq!(missing, path);
            }
            Err(other) => panic!("expected ArtifactNotFound for {}, got {}", file, other),
            Ok(_) => panic!("pipeline loaded without {}", file),
        }
    }
}

#[test]
fn corrupt_artifacts_fail_startup() {
    let dir = TempDir::new().unwrap();
    let config = common::install(dir.path());
    fs::write(dir.path().join("models/label_encoder.json"), b"\x80\x04\x95").unwrap();

    let err = InferencePipeline::load_from_root(&config, dir.path()).err().unwrap();
    assert!(err.is_startup_fatal());
    assert!(matches!(
        err,
        PipelineError::ArtifactCorrupt {
            artifact: ArtifactKind::LabelEncoder,
            ..
        }
    ));
}

#[test]
fn misordered_scaler_fails_startup() {
    let dir = TempDir::new().unwrap();
    let config = common::install(dir.path());
    let mut scaler = common::scaler();
    scaler["feature_names"] =
        serde_json::json!(["N", "P", "K", "humidity", "temperature", "ph", "rainfall"]);
    common::write_json(&dir.path().join("models/scaler.json"), &scaler);

    let err = InferencePipeline::load_from_root(&config, dir.path()).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::ArtifactCorrupt {
            artifact: ArtifactKind::Scaler,
            ..
        }
    ));
}

#[test]
fn encoder_mismatch_surfaces_as_unknown_class() {
    let dir = TempDir::new().unwrap();
    let config = common::install(dir.path());
    common::write_json(
        &dir.path().join("models/label_encoder.json"),
        &serde_json::json!({ "classes": ["maize"] }),
    );

    let pipeline = load(dir.path(), &config);
    let err = pipeline.predict(&FeatureVector::rice_exemplar()).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownClassIndex { index: 1, known: 1 }));
}

#[test]
fn absolute_models_dir_ignores_root() {
    let artifacts = TempDir::new().unwrap();
    let installed = common::install(artifacts.path());
    let config = ModelsConfig {
        models_dir: artifacts.path().join("models").to_string_lossy().into_owned(),
        ..installed
    };

    let elsewhere = TempDir::new().unwrap();
    let pipeline = load(elsewhere.path(), &config);
    assert_eq!(
        pipeline.predict(&FeatureVector::rice_exemplar()).unwrap().crop_name,
        "rice"
    );
}

#[test]
fn missing_classifier_is_not_found_whatever_its_format() {
    for file in ["rf_model.pkl", "rf_model.onnx", "rf_model"] {
        let dir = TempDir::new().unwrap();
        let config = ModelsConfig {
            classifier_file: file.to_string(),
            ..common::install(dir.path())
        };

        match InferencePipeline::load_from_root(&config, dir.path()) {
            Err(PipelineError::ArtifactNotFound { artifact, path }) => {
                assert_eq!(artifact, ArtifactKind::Classifier);
                assert_eq!(path, dir.path().join("models").join(file));
            }
            Err(other) => panic!("expected ArtifactNotFound for {}, got {}", file, other),
            Ok(_) => panic!("pipeline loaded without {}", file),
        }
    }
}
