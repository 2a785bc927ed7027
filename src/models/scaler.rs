//! Standard scaler artifact

use crate::error::{ArtifactKind, PipelineError, PipelineResult};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ScalerFile {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

/// Per-feature standardization fitted offline: `(x - mean) / scale`.
///
/// Values outside the fitted range extrapolate; nothing is clamped.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build from raw parameters. A zero scale marks a constant feature and
    /// is treated as 1.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        if mean.len() != scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            ));
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err("non-finite scaler parameter".to_string());
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self { mean, scale })
    }

    /// Parse a scaler artifact from JSON bytes.
    pub fn from_json(bytes: &[u8], path: &Path) -> PipelineResult<Self> {
        let file: ScalerFile = serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::corrupt(ArtifactKind::Scaler, path, e))?;

        if let Some(names) = &file.feature_names {
            if names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
                return Err(PipelineError::corrupt(
                    ArtifactKind::Scaler,
                    path,
                    format!(
                        "fitted on features {:?}, expected {:?}",
                        names, FEATURE_NAMES
                    ),
                ));
            }
        }

        let scaler = Self::new(file.mean, file.scale)
            .map_err(|reason| PipelineError::corrupt(ArtifactKind::Scaler, path, reason))?;

        if scaler.n_features() != FEATURE_COUNT {
            return Err(PipelineError::corrupt(
                ArtifactKind::Scaler,
                path,
                format!(
                    "expects {} features, pipeline supplies {}",
                    scaler.n_features(),
                    FEATURE_COUNT
                ),
            ));
        }

        Ok(scaler)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Normalize a raw feature row.
    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }
}
