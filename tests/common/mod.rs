//! Fixture artifacts shared by the integration tests

#![allow(dead_code)]

use crop_advisor::config::ModelsConfig;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

pub const CROPS: [&str; 3] = ["maize", "rice", "chickpea"];

pub fn scaler() -> Value {
    json!({
        "mean": [50.55, 53.36, 48.15, 25.62, 71.48, 6.47, 103.46],
        "scale": [36.91, 32.98, 50.64, 5.06, 22.26, 0.77, 54.95],
        "feature_names": ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"]
    })
}

pub fn label_encoder() -> Value {
    json!({ "classes": CROPS })
}

/// Three small trees over scaled humidity (4) and rainfall (6)
pub fn forest() -> Value {
    json!({
        "n_features": 7,
        "n_classes": 3,
        "feature_names": ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"],
        "trees": [
            { "nodes": [
                { "feature": 6, "threshold": 1.0, "left": 1, "right": 4, "impurity": 0.64, "n_samples": 30.0 },
                { "feature": 4, "threshold": -1.0, "left": 2, "right": 3, "impurity": 0.5, "n_samples": 20.0 },
                { "value": [0.0, 0.0, 10.0], "impurity": 0.0, "n_samples": 10.0 },
                { "value": [8.0, 1.0, 1.0], "impurity": 0.34, "n_samples": 10.0 },
                { "value": [1.0, 9.0, 0.0], "impurity": 0.18, "n_samples": 10.0 }
            ]},
            { "nodes": [
                { "feature": 4, "threshold": 0.0, "left": 1, "right": 2, "impurity": 0.66, "n_samples": 30.0 },
                { "value": [2.0, 0.0, 8.0], "impurity": 0.32, "n_samples": 10.0 },
                { "feature": 6, "threshold": 1.5, "left": 3, "right": 4, "impurity": 0.5, "n_samples": 20.0 },
                { "value": [7.0, 3.0, 0.0], "impurity": 0.42, "n_samples": 10.0 },
                { "value": [0.0, 10.0, 0.0], "impurity": 0.0, "n_samples": 10.0 }
            ]},
            { "nodes": [
                { "feature": 6, "threshold": 0.8, "left": 1, "right": 2, "impurity": 0.6, "n_samples": 20.0 },
                { "value": [6.0, 0.0, 4.0], "impurity": 0.48, "n_samples": 10.0 },
                { "value": [0.0, 10.0, 0.0], "impurity": 0.0, "n_samples": 10.0 }
            ]}
        ]
    })
}

pub fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Write all three artifacts under `<root>/models` and return a matching config
pub fn install(root: &Path) -> ModelsConfig {
    let config = ModelsConfig::default();
    let models = root.join(&config.models_dir);
    fs::create_dir_all(&models).unwrap();
    write_json(&models.join(&config.scaler_file), &scaler());
    write_json(&models.join(&config.classifier_file), &forest());
    write_json(&models.join(&config.label_encoder_file), &label_encoder());
    config
}
