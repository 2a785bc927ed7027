//! Label encoder artifact

use crate::error::{ArtifactKind, PipelineError, PipelineResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct EncoderFile {
    classes: Vec<String>,
}

/// Maps classifier output indices to crop names and back.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, String> {
        if classes.is_empty() {
            return Err("no classes".to_string());
        }

        let mut seen = HashSet::new();
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(format!("duplicate class '{}'", class));
            }
        }

        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        Ok(Self { classes, index })
    }

    /// Parse a label encoder artifact from JSON bytes.
    pub fn from_json(bytes: &[u8], path: &Path) -> PipelineResult<Self> {
        let file: EncoderFile = serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::corrupt(ArtifactKind::LabelEncoder, path, e))?;
        Self::new(file.classes)
            .map_err(|reason| PipelineError::corrupt(ArtifactKind::LabelEncoder, path, reason))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Class index to crop name.
    pub fn decode(&self, index: usize) -> PipelineResult<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(PipelineError::UnknownClassIndex {
                index,
                known: self.classes.len(),
            })
    }

    /// Crop name to class index.
    pub fn encode(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
