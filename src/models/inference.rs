//! Crop inference pipeline: scale, classify, decode, explain

use crate::config::ModelsConfig;
use crate::error::PipelineResult;
use crate::features::{FeatureVector, FEATURE_NAMES};
use crate::models::classifier::{check_importances, Classifier, ClassifierCapabilities};
use crate::models::encoder::LabelEncoder;
use crate::models::loader::{install_root, ArtifactPaths, ModelLoader};
use crate::models::scaler::StandardScaler;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// One feature's global importance score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: &'static str,
    pub score: f64,
}

/// Result of model inference
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Decoded crop label
    pub crop_name: String,
    /// Probability of the top class; `None` when the classifier has no
    /// probability output, which is not the same as zero
    pub confidence: Option<f64>,
    /// Global importances, highest first
    pub feature_importances: Option<Vec<FeatureImportance>>,
}

/// Scaler, classifier and label encoder loaded once and shared read-only
pub struct InferencePipeline {
    scaler: StandardScaler,
    classifier: Box<dyn Classifier>,
    encoder: LabelEncoder,
    capabilities: ClassifierCapabilities,
}

impl InferencePipeline {
    /// Assemble a pipeline from already-loaded artifacts.
    pub fn new(
        scaler: StandardScaler,
        classifier: Box<dyn Classifier>,
        encoder: LabelEncoder,
    ) -> Self {
        let capabilities = classifier.capabilities();

        if let Some(n_classes) = classifier.n_classes() {
            if n_classes != encoder.len() {
                warn!(
                    classifier_classes = n_classes,
                    encoder_classes = encoder.len(),
                    "Classifier and label encoder disagree on class count"
                );
            }
        }

        info!(
            classifier = classifier.name(),
            classes = encoder.len(),
            probabilities = capabilities.probabilities,
            feature_importances = capabilities.feature_importances,
            "Inference pipeline initialized"
        );

        Self {
            scaler,
            classifier,
            encoder,
            capabilities,
        }
    }

    /// Load all artifacts from the installation directory.
    pub fn load(config: &ModelsConfig) -> PipelineResult<Self> {
        Self::load_from_root(config, &install_root())
    }

    /// Load all artifacts with relative paths resolved under `root`.
    pub fn load_from_root(config: &ModelsConfig, root: &Path) -> PipelineResult<Self> {
        let paths = ArtifactPaths::resolve(config, root);
        let loader = ModelLoader::with_threads(config.onnx_threads);

        let classifier = loader.load_classifier(&paths.classifier, paths.importances.as_deref())?;
        let scaler = loader.load_scaler(&paths.scaler)?;
        let encoder = loader.load_label_encoder(&paths.label_encoder)?;

        Ok(Self::new(scaler, classifier, encoder))
    }

    pub fn capabilities(&self) -> ClassifierCapabilities {
        self.capabilities
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Every crop the pipeline can return
    pub fn class_names(&self) -> &[String] {
        self.encoder.classes()
    }

    /// Run the full pipeline on one feature vector
    pub fn predict(&self, features: &FeatureVector) -> PipelineResult<PredictionResult> {
        features.validate()?;

        let scaled = self.scaler.transform(&features.to_array());
        let output = self.classifier.classify(&scaled)?;

        let confidence = if self.capabilities.probabilities {
            output.probabilities.as_deref().and_then(confidence_of)
        } else {
            None
        };

        let crop_name = self.encoder.decode(output.class_index)?.to_string();

        let feature_importances = if self.capabilities.feature_importances {
            self.ranked_importances()
        } else {
            None
        };

        debug!(
            crop = %crop_name,
            class_index = output.class_index,
            confidence = ?confidence,
            "Prediction complete"
        );

        Ok(PredictionResult {
            crop_name,
            confidence,
            feature_importances,
        })
    }

    /// Validate an untyped, ordered row and predict
    pub fn predict_values(&self, values: &[f64]) -> PipelineResult<PredictionResult> {
        let features = FeatureVector::from_slice(values)?;
        self.predict(&features)
    }

    /// Run inference on a batch of feature vectors
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Vec<PipelineResult<PredictionResult>> {
        batch.iter().map(|f| self.predict(f)).collect()
    }

    /// Pair importances with feature names, highest first. Best effort.
    fn ranked_importances(&self) -> Option<Vec<FeatureImportance>> {
        let scores = self.classifier.feature_importances()?;
        if let Err(reason) = check_importances(scores) {
            debug!(reason = %reason, "Skipping feature importances");
            return None;
        }

        let mut ranked: Vec<FeatureImportance> = FEATURE_NAMES
            .iter()
            .zip(scores)
            .map(|(&feature, &score)| FeatureImportance { feature, score })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Some(ranked)
    }
}

/// Maximum of a probability distribution, or `None` if it is not one.
fn confidence_of(probabilities: &[f64]) -> Option<f64> {
    if probabilities.is_empty() {
        return None;
    }
    if probabilities
        .iter()
        .any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0)
    {
        warn!(?probabilities, "Classifier returned an invalid probability vector");
        return None;
    }
    probabilities.iter().copied().reduce(f64::max)
}
