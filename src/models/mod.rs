//! Model artifacts and the inference pipeline

pub mod classifier;
pub mod encoder;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod onnx;
pub mod scaler;

pub use classifier::{Classifier, ClassifierCapabilities};
pub use encoder::LabelEncoder;
pub use forest::RandomForest;
pub use inference::{FeatureImportance, InferencePipeline, PredictionResult};
pub use loader::ModelLoader;
pub use onnx::OnnxClassifier;
pub use scaler::StandardScaler;
