//! Configuration management for the crop advisor service

use crate::models::loader::{install_root, resolve};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Config file location relative to the installation directory
pub const CONFIG_FILE: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject prediction requests arrive on
    pub request_subject: String,
    /// Queue group shared by service replicas
    pub queue_group: String,
    /// Optional subject that also receives every successful result
    pub results_subject: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_subject: "crop.predict".to_string(),
            queue_group: "crop-advisor".to_string(),
            results_subject: None,
        }
    }
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing the artifacts, relative to the installation directory
    pub models_dir: String,
    /// Fitted feature scaler
    pub scaler_file: String,
    /// Classifier (`.json` forest dump or `.onnx` graph)
    pub classifier_file: String,
    /// Label encoder
    pub label_encoder_file: String,
    /// Optional importances sidecar for classifiers that do not carry their own
    pub importances_file: Option<String>,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            scaler_file: "scaler.json".to_string(),
            classifier_file: "rf_model.json".to_string(),
            label_encoder_file: "label_encoder.json".to_string(),
            importances_file: None,
            onnx_threads: 1,
        }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum requests processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries (0 disables the reporter)
    pub metrics_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `config/config.toml` from the installation directory
    pub fn load() -> Result<Self> {
        Self::load_from_path(resolve(&install_root(), CONFIG_FILE))
    }

    /// Load configuration from a specific path, with `CROP_ADVISOR__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("CROP_ADVISOR").separator("__"))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.request_subject, "crop.predict");
        assert_eq!(config.models.models_dir, "models");
        assert_eq!(config.models.classifier_file, "rf_model.json");
        assert!(config.models.importances_file.is_none());
        assert_eq!(config.service.workers, 4);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[models]
classifier_file = "rf_model.onnx"
importances_file = "feature_importances.json"

[service]
workers = 8
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.models.classifier_file, "rf_model.onnx");
        assert_eq!(
            config.models.importances_file.as_deref(),
            Some("feature_importances.json")
        );
        assert_eq!(config.models.scaler_file, "scaler.json");
        assert_eq!(config.service.workers, 8);
        assert_eq!(config.nats.queue_group, "crop-advisor");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(AppConfig::load_from_path(dir.path().join("nope.toml")).is_err());
    }
}
