//! Classifier abstraction shared by the native forest and ONNX backends

use crate::error::PipelineResult;
use crate::features::FEATURE_COUNT;

/// What a loaded classifier can provide beyond a class index.
///
/// Probed once at load time and never re-checked per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierCapabilities {
    /// Produces a probability distribution over classes
    pub probabilities: bool,
    /// Exposes global per-feature importances
    pub feature_importances: bool,
}

/// Raw classifier output for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ClassOutput {
    /// Top predicted class index
    pub class_index: usize,
    /// Distribution over class indices, when supported
    pub probabilities: Option<Vec<f64>>,
}

/// A loaded, immutable classification model.
pub trait Classifier: Send + Sync {
    /// Human-readable backend name for logging
    fn name(&self) -> &str;

    /// Number of classes, if the artifact declares it
    fn n_classes(&self) -> Option<usize>;

    fn capabilities(&self) -> ClassifierCapabilities;

    /// Classify one normalized row.
    fn classify(&self, x: &[f64]) -> PipelineResult<ClassOutput>;

    /// Global importances in model input order.
    fn feature_importances(&self) -> Option<&[f64]>;
}

/// Index of the largest value; the lowest index wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Check an importance vector: one finite, non-negative score per feature.
pub fn check_importances(scores: &[f64]) -> Result<(), String> {
    if scores.len() != FEATURE_COUNT {
        return Err(format!(
            "expected {} importances, got {}",
            FEATURE_COUNT,
            scores.len()
        ));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(format!("importance {} is not a non-negative number", bad));
    }
    Ok(())
}
