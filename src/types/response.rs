//! Prediction reply envelopes

use crate::error::PipelineError;
use crate::features::FeatureVector;
use crate::models::inference::PredictionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature name with its global importance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub feature: String,
    pub score: f64,
}

/// Successful prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub request_id: String,

    /// Recommended crop
    pub crop: String,

    /// Omitted entirely when the classifier has no probability output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Global importances, highest first; omitted when unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<RankedFeature>>,

    /// Echo of the readings the prediction was made from
    pub inputs: FeatureVector,

    /// Fields outside the form's guidance ranges (informational)
    #[serde(default)]
    pub out_of_range: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl PredictionResponse {
    pub fn new(request_id: String, inputs: FeatureVector, result: PredictionResult) -> Self {
        Self {
            request_id,
            crop: result.crop_name,
            confidence: result.confidence,
            feature_importances: result.feature_importances.map(|ranked| {
                ranked
                    .into_iter()
                    .map(|r| RankedFeature {
                        feature: r.feature.to_string(),
                        score: r.score,
                    })
                    .collect()
            }),
            out_of_range: inputs
                .out_of_range()
                .into_iter()
                .map(str::to_string)
                .collect(),
            inputs,
            timestamp: Utc::now(),
        }
    }
}

/// Per-request failure, returned to the caller instead of a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionFailure {
    pub request_id: String,
    /// `invalid_input`, `unknown_class_index` or `inference`
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PredictionFailure {
    pub fn new(request_id: String, err: &PipelineError) -> Self {
        Self {
            request_id,
            kind: err.kind().to_string(),
            message: err.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Reply published on the request's reply subject
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictionReply {
    Ok(PredictionResponse),
    Error(PredictionFailure),
}

impl PredictionReply {
    pub fn request_id(&self) -> &str {
        match self {
            PredictionReply::Ok(r) => &r.request_id,
            PredictionReply::Error(f) => &f.request_id,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PredictionReply::Ok(_))
    }
}
