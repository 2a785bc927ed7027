//! ONNX classifier backend

use crate::error::{ArtifactKind, PipelineError, PipelineResult};
use crate::models::classifier::{
    argmax, check_importances, ClassOutput, Classifier, ClassifierCapabilities,
};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Classifier exported to ONNX.
///
/// Probabilities are read either as a float tensor (zipmap disabled) or as the
/// `seq(map(int64, float))` a default scikit-learn export produces.
pub struct OnnxClassifier {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Mutex<Session>,
    /// Input name for the model
    input_name: String,
    /// Int64 label output, when the graph has one
    label_output: Option<String>,
    /// Probability output (tensor or seq(map)), when the graph has one
    prob_output: Option<String>,
    importances: Option<Vec<f64>>,
}

impl OnnxClassifier {
    /// Load an ONNX classifier from file
    pub fn load(path: &Path, onnx_threads: usize) -> PipelineResult<Self> {
        info!(path = %path.display(), threads = onnx_threads, "Loading ONNX classifier");

        let session = Session::builder()
            .map_err(|e| load_error(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(path, e))?
            .with_intra_threads(onnx_threads)
            .map_err(|e| load_error(path, e))?
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let prob_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        if label_output.is_none() && prob_output.is_none() {
            return Err(PipelineError::corrupt(
                ArtifactKind::Classifier,
                path,
                "graph has neither a label nor a probability output",
            ));
        }

        info!(
            input = %input_name,
            label_output = ?label_output,
            prob_output = ?prob_output,
            "ONNX classifier loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            label_output,
            prob_output,
            importances: None,
        })
    }

    /// Attach global importances from a sidecar artifact.
    pub fn with_importances(mut self, scores: Vec<f64>) -> Self {
        self.importances = accepted_importances(scores);
        self
    }

    fn extract_label(&self, outputs: &SessionOutputs) -> Option<usize> {
        let output = outputs.get(self.label_output.as_deref()?)?;
        let (_, data) = output.try_extract_tensor::<i64>().ok()?;
        data.first().and_then(|&v| usize::try_from(v).ok())
    }

    fn extract_probabilities(&self, outputs: &SessionOutputs) -> Option<Vec<f64>> {
        let output = outputs.get(self.prob_output.as_deref()?)?;

        // [1, num_classes] for a single row
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            return Some(data.iter().map(|&p| p as f64).collect());
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            match extract_from_sequence_map(output) {
                Ok(probabilities) => return probabilities,
                Err(e) => debug!(error = %e, "Failed to read seq(map) probabilities"),
            }
        }

        debug!("Probability output is neither a float tensor nor a seq(map)");
        None
    }
}

/// Read the first row of a seq(map(int64, float)) probability output.
fn extract_from_sequence_map(output: &DynValue) -> ort::Result<Option<Vec<f64>>> {
    let allocator = Allocator::default();
    let sequence = output.downcast_ref::<DynSequenceValueType>()?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    // batch of one row
    let Some(map) = maps.first() else {
        return Ok(None);
    };
    let pairs = map.try_extract_key_values::<i64, f32>()?;
    Ok(dense_probabilities(&pairs))
}

/// Upper bound on class keys in a probability map
const MAX_CLASSES: usize = 4096;

/// Lay class-keyed probabilities out densely by class index.
///
/// Classes missing from the map get 0. Negative, repeated or absurdly large
/// class keys make the map unusable.
pub(crate) fn dense_probabilities(pairs: &[(i64, f32)]) -> Option<Vec<f64>> {
    let width = pairs.iter().map(|&(k, _)| k).max()?;
    let width = usize::try_from(width).ok()? + 1;
    if width > MAX_CLASSES {
        warn!(width, "Probability map class keys out of range");
        return None;
    }

    let mut dense = vec![0.0; width];
    let mut seen = vec![false; width];
    for &(class, p) in pairs {
        let i = usize::try_from(class).ok()?;
        if seen[i] {
            warn!(class, "Repeated class in probability map");
            return None;
        }
        seen[i] = true;
        dense[i] = p as f64;
    }
    Some(dense)
}

/// Validated sidecar importances, or `None` with a warning.
pub(crate) fn accepted_importances(scores: Vec<f64>) -> Option<Vec<f64>> {
    match check_importances(&scores) {
        Ok(()) => Some(scores),
        Err(reason) => {
            warn!(reason = %reason, "Ignoring invalid feature importances");
            None
        }
    }
}

fn load_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::corrupt(ArtifactKind::Classifier, path, e)
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn n_classes(&self) -> Option<usize> {
        None
    }

    fn capabilities(&self) -> ClassifierCapabilities {
        ClassifierCapabilities {
            probabilities: self.prob_output.is_some(),
            feature_importances: self.importances.is_some(),
        }
    }

    fn classify(&self, x: &[f64]) -> PipelineResult<ClassOutput> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, x.len() as i64];
        let row: Vec<f32> = x.iter().map(|&v| v as f32).collect();
        let input_tensor = Tensor::from_array((shape, row))
            .map_err(|e| PipelineError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PipelineError::Inference(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let probabilities = self.extract_probabilities(&outputs);
        let class_index = self
            .extract_label(&outputs)
            .or_else(|| probabilities.as_deref().and_then(argmax))
            .ok_or_else(|| {
                PipelineError::Inference("model produced no usable class output".to_string())
            })?;

        Ok(ClassOutput {
            class_index,
            probabilities,
        })
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}
