//! Error types for the crop inference pipeline

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which artifact a load failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Scaler,
    Classifier,
    LabelEncoder,
    Importances,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Classifier => "classifier",
            ArtifactKind::LabelEncoder => "label encoder",
            ArtifactKind::Importances => "feature importances",
        };
        f.write_str(name)
    }
}

/// Errors raised while loading artifacts or serving a prediction
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Artifact path does not resolve to an existing file
    #[error("{artifact} artifact not found: {}", path.display())]
    ArtifactNotFound { artifact: ArtifactKind, path: PathBuf },

    /// Artifact exists but could not be deserialized or failed validation
    #[error("{artifact} artifact at {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt {
        artifact: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    /// Caller supplied a malformed feature vector
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Classifier produced an index the label encoder does not know
    #[error("Unknown class index {index} (label encoder knows {known} classes)")]
    UnknownClassIndex { index: usize, known: usize },

    /// Classifier runtime failed
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    pub(crate) fn corrupt(
        artifact: ArtifactKind,
        path: impl Into<PathBuf>,
        reason: impl fmt::Display,
    ) -> Self {
        PipelineError::ArtifactCorrupt {
            artifact,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable tag used in failure replies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ArtifactNotFound { .. } => "artifact_not_found",
            PipelineError::ArtifactCorrupt { .. } => "artifact_corrupt",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::UnknownClassIndex { .. } => "unknown_class_index",
            PipelineError::Inference(_) => "inference",
        }
    }

    /// True for errors that must stop the process before serving
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ArtifactNotFound { .. } | PipelineError::ArtifactCorrupt { .. }
        )
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
