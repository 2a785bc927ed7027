//! Prediction request envelope

use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureInput, FeatureVector};
use serde::{Deserialize, Serialize};

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A prediction request as published by the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Caller correlation id; generated when omitted
    #[serde(default = "new_request_id")]
    pub request_id: String,

    /// Seven readings, named or in model order
    pub features: FeatureInput,
}

impl PredictionRequest {
    pub fn new(features: FeatureVector) -> Self {
        Self {
            request_id: new_request_id(),
            features: FeatureInput::Named(features),
        }
    }

    /// Decode a request payload. Malformed JSON is the caller's error.
    pub fn from_slice(payload: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| PipelineError::InvalidInput(format!("malformed request: {}", e)))
    }

    /// Caller's `request_id` from a payload that may not decode as a request.
    ///
    /// Lets a failure reply for malformed features still correlate.
    pub fn request_id_of(payload: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
        value.get("request_id")?.as_str().map(str::to_owned)
    }

    /// Validated feature vector
    pub fn feature_vector(&self) -> PipelineResult<FeatureVector> {
        self.features.clone().into_vector()
    }
}
