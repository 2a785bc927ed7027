//! Crop Advisor Library
//!
//! Recommends a crop from soil nutrients and weather readings using a
//! pre-trained scaler, classifier and label encoder loaded from disk.

pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactKind, PipelineError, PipelineResult};
pub use features::{FeatureVector, FEATURE_NAMES};
pub use models::inference::{InferencePipeline, PredictionResult};
pub use producer::ReplyProducer;
pub use types::{PredictionReply, PredictionRequest};
