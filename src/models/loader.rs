//! Artifact loader
//!
//! Relative artifact paths resolve against the installation directory, never
//! against the process working directory.

use crate::config::ModelsConfig;
use crate::error::{ArtifactKind, PipelineError, PipelineResult};
use crate::models::classifier::Classifier;
use crate::models::encoder::LabelEncoder;
use crate::models::forest::RandomForest;
use crate::models::onnx::OnnxClassifier;
use crate::models::scaler::StandardScaler;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the installation directory
pub const HOME_ENV: &str = "CROP_ADVISOR_HOME";

/// Directory the service is installed in.
///
/// `CROP_ADVISOR_HOME` when set, otherwise derived from the running executable
/// (see [`root_from`]).
pub fn install_root() -> PathBuf {
    root_from(std::env::var_os(HOME_ENV), std::env::current_exe().ok())
}

/// Pick the installation directory from the override and the executable path.
///
/// A binary under `<root>/bin/` maps to `<root>`, any other binary to its own
/// directory. The crate root fixed at build time is the last resort when the
/// executable path is unknown.
pub fn root_from(home: Option<OsString>, exe: Option<PathBuf>) -> PathBuf {
    if let Some(home) = home.filter(|h| !h.is_empty()) {
        return PathBuf::from(home);
    }

    let exe_dir = exe.as_deref().and_then(Path::parent);
    match exe_dir {
        Some(dir) if dir.file_name().is_some_and(|n| n == "bin") => dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf()),
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR")),
    }
}

/// Join `path` onto `root` unless it is already absolute.
pub fn resolve(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[derive(Debug, Deserialize)]
struct ImportancesFile {
    feature_importances: Vec<f64>,
}

/// Resolved locations of every artifact the pipeline needs
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub classifier: PathBuf,
    pub label_encoder: PathBuf,
    pub importances: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Resolve configured file names under `root`.
    pub fn resolve(config: &ModelsConfig, root: &Path) -> Self {
        let models_dir = resolve(root, &config.models_dir);
        Self {
            scaler: models_dir.join(&config.scaler_file),
            classifier: models_dir.join(&config.classifier_file),
            label_encoder: models_dir.join(&config.label_encoder_file),
            importances: config.importances_file.as_ref().map(|f| models_dir.join(f)),
        }
    }
}

/// Loader for scaler, classifier and label encoder artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Fail with `ArtifactNotFound` unless `path` is an existing file.
    pub fn ensure_exists(&self, artifact: ArtifactKind, path: &Path) -> PipelineResult<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(PipelineError::ArtifactNotFound {
                artifact,
                path: path.to_path_buf(),
            })
        }
    }

    /// Read an artifact's bytes, failing with `ArtifactNotFound` if it is not a file.
    pub fn read_artifact(&self, artifact: ArtifactKind, path: &Path) -> PipelineResult<Vec<u8>> {
        self.ensure_exists(artifact, path)?;

        info!(artifact = %artifact, path = %path.display(), "Loading artifact");

        fs::read(path).map_err(|e| PipelineError::corrupt(artifact, path, e))
    }

    pub fn load_scaler(&self, path: &Path) -> PipelineResult<StandardScaler> {
        let bytes = self.read_artifact(ArtifactKind::Scaler, path)?;
        StandardScaler::from_json(&bytes, path)
    }

    pub fn load_label_encoder(&self, path: &Path) -> PipelineResult<LabelEncoder> {
        let bytes = self.read_artifact(ArtifactKind::LabelEncoder, path)?;
        let encoder = LabelEncoder::from_json(&bytes, path)?;
        info!(classes = encoder.len(), "Label encoder loaded");
        Ok(encoder)
    }

    /// Load the classifier, choosing the backend from the file extension.
    pub fn load_classifier(
        &self,
        path: &Path,
        importances: Option<&Path>,
    ) -> PipelineResult<Box<dyn Classifier>> {
        self.ensure_exists(ArtifactKind::Classifier, path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => {
                let bytes = self.read_artifact(ArtifactKind::Classifier, path)?;
                let forest = RandomForest::from_json(&bytes, path)?;
                info!(trees = forest.n_trees(), "Random forest loaded");
                if let Some(sidecar) = importances {
                    warn!(
                        path = %sidecar.display(),
                        "Forest artifacts carry their own importances, ignoring sidecar"
                    );
                }
                Ok(Box::new(forest))
            }
            Some("onnx") => {
                let mut model = OnnxClassifier::load(path, self.onnx_threads)?;
                if let Some(sidecar) = importances {
                    if let Some(scores) = self.load_importances(sidecar) {
                        model = model.with_importances(scores);
                    }
                }
                Ok(Box::new(model))
            }
            other => Err(PipelineError::corrupt(
                ArtifactKind::Classifier,
                path,
                format!(
                    "unsupported classifier format {:?} (expected .json or .onnx)",
                    other.unwrap_or("")
                ),
            )),
        }
    }

    /// Best-effort sidecar importances; failures are logged, never fatal.
    pub fn load_importances(&self, path: &Path) -> Option<Vec<f64>> {
        let result = self
            .read_artifact(ArtifactKind::Importances, path)
            .and_then(|bytes| {
                serde_json::from_slice::<ImportancesFile>(&bytes)
                    .map_err(|e| PipelineError::corrupt(ArtifactKind::Importances, path, e))
            });

        match result {
            Ok(file) => Some(file.feature_importances),
            Err(e) => {
                warn!(error = %e, "Feature importances unavailable");
                None
            }
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/opt/crop-advisor");
        assert_eq!(resolve(root, "models"), PathBuf::from("/opt/crop-advisor/models"));
        assert_eq!(resolve(root, "/srv/models"), PathBuf::from("/srv/models"));
    }

    #[test]
    fn test_root_from_home_override() {
        let root = root_from(
            Some(OsString::from("/srv/crops")),
            Some(PathBuf::from("/opt/crop-advisor/bin/crop-advisor")),
        );
        assert_eq!(root, PathBuf::from("/srv/crops"));
    }

    #[test]
    fn test_root_from_executable() {
        assert_eq!(
            root_from(None, Some(PathBuf::from("/opt/crop-advisor/bin/crop-advisor"))),
            PathBuf::from("/opt/crop-advisor")
        );
        assert_eq!(
            root_from(None, Some(PathBuf::from("/opt/crop-advisor/crop-advisor"))),
            PathBuf::from("/opt/crop-advisor")
        );
        // empty override is ignored
        assert_eq!(
            root_from(
                Some(OsString::new()),
                Some(PathBuf::from("/usr/local/bin/crop-advisor"))
            ),
            PathBuf::from("/usr/local")
        );
    }

    #[test]
    fn test_root_from_unknown_executable() {
        assert_eq!(root_from(None, None), PathBuf::from(env!("CARGO_MANIFEST_DIR")));
    }

    #[test]
    fn test_artifact_paths() {
        let config = ModelsConfig::default();
        let paths = ArtifactPaths::resolve(&config, Path::new("/opt/crop-advisor"));
        assert_eq!(paths.scaler, PathBuf::from("/opt/crop-advisor/models/scaler.json"));
        assert_eq!(
            paths.classifier,
            PathBuf::from("/opt/crop-advisor/models/rf_model.json")
        );
        assert!(paths.importances.is_none());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let loader = ModelLoader::new();
        let err = loader
            .load_scaler(&dir.path().join("scaler.json"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ArtifactNotFound {
                artifact: ArtifactKind::Scaler,
                ..
            }
        ));
    }

    #[test]
    fn test_directory_is_not_an_artifact() {
        let dir = TempDir::new().unwrap();
        let err = ModelLoader::new()
            .load_label_encoder(dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_unsupported_classifier_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rf_model.pkl");
        fs::write(&path, b"\x80\x04").unwrap();
        let err = ModelLoader::new().load_classifier(&path, None).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_missing_classifier_with_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rf_model.pkl");
        let err = ModelLoader::new().load_classifier(&path, None).err().unwrap();
        assert!(matches!(
            err,
            PipelineError::ArtifactNotFound {
                artifact: ArtifactKind::Classifier,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_onnx_classifier() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rf_model.onnx");
        let err = ModelLoader::new().load_classifier(&path, None).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_importances_are_best_effort() {
        let dir = TempDir::new().unwrap();
        let loader = ModelLoader::new();
        assert!(loader.load_importances(&dir.path().join("missing.json")).is_none());

        let path = dir.path().join("feature_importances.json");
        fs::write(&path, br#"{"feature_importances": [0.1, 0.1, 0.1, 0.2, 0.2, 0.1, 0.2]}"#)
            .unwrap();
        assert_eq!(loader.load_importances(&path).map(|v| v.len()), Some(7));
    }
}
