//! Random forest classifier loaded from a JSON tree dump.
//!
//! Each tree is a flat node array rooted at index 0. A split sends a row to
//! `left` when `x[feature] <= threshold`, otherwise to `right`. Leaves hold
//! per-class weights (sample counts or fractions); the forest probability is
//! the mean of every tree's normalized leaf distribution.

use crate::error::{ArtifactKind, PipelineError, PipelineResult};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};
use crate::models::classifier::{
    argmax, check_importances, ClassOutput, Classifier, ClassifierCapabilities,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NodeFile {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        impurity: Option<f64>,
        #[serde(default)]
        n_samples: Option<f64>,
    },
    Leaf {
        value: Vec<f64>,
        #[serde(default)]
        impurity: Option<f64>,
        #[serde(default)]
        n_samples: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    nodes: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
struct ForestFile {
    n_features: usize,
    n_classes: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
    trees: Vec<TreeFile>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_for(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }
}

/// Tree-ensemble classifier evaluated natively
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_classes: usize,
    trees: Vec<Tree>,
    importances: Option<Vec<f64>>,
}

impl RandomForest {
    /// Parse and validate a forest artifact from JSON bytes.
    pub fn from_json(bytes: &[u8], path: &Path) -> PipelineResult<Self> {
        let corrupt = |reason: String| PipelineError::corrupt(ArtifactKind::Classifier, path, reason);

        let file: ForestFile = serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::corrupt(ArtifactKind::Classifier, path, e))?;

        if file.n_features != FEATURE_COUNT {
            return Err(corrupt(format!(
                "expects {} features, pipeline supplies {}",
                file.n_features, FEATURE_COUNT
            )));
        }
        if let Some(names) = &file.feature_names {
            if names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
                return Err(corrupt(format!(
                    "fitted on features {:?}, expected {:?}",
                    names, FEATURE_NAMES
                )));
            }
        }
        if file.n_classes == 0 {
            return Err(corrupt("n_classes is 0".to_string()));
        }
        if file.trees.is_empty() {
            return Err(corrupt("forest has no trees".to_string()));
        }

        let mut trees = Vec::with_capacity(file.trees.len());
        for (t, tree) in file.trees.iter().enumerate() {
            trees.push(
                build_tree(tree, file.n_features, file.n_classes)
                    .map_err(|reason| corrupt(format!("tree {}: {}", t, reason)))?,
            );
        }

        let importances = match file.feature_importances {
            Some(explicit) => match check_importances(&explicit) {
                Ok(()) => Some(explicit),
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "Ignoring invalid feature importances");
                    None
                }
            },
            None => impurity_importances(&file.trees, file.n_features),
        };

        debug!(
            trees = trees.len(),
            classes = file.n_classes,
            importances = importances.is_some(),
            "Random forest parsed"
        );

        Ok(Self {
            n_classes: file.n_classes,
            trees,
            importances,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean class distribution across trees.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, &v) in proba.iter_mut().zip(tree.leaf_for(x)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn n_classes(&self) -> Option<usize> {
        Some(self.n_classes)
    }

    fn capabilities(&self) -> ClassifierCapabilities {
        ClassifierCapabilities {
            probabilities: true,
            feature_importances: self.importances.is_some(),
        }
    }

    fn classify(&self, x: &[f64]) -> PipelineResult<ClassOutput> {
        if x.len() != FEATURE_COUNT {
            return Err(PipelineError::InvalidInput(format!(
                "forest expects {} features, got {}",
                FEATURE_COUNT,
                x.len()
            )));
        }

        let probabilities = self.predict_proba(x);
        let class_index = argmax(&probabilities)
            .ok_or_else(|| PipelineError::Inference("empty probability vector".to_string()))?;

        Ok(ClassOutput {
            class_index,
            probabilities: Some(probabilities),
        })
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}

fn build_tree(tree: &TreeFile, n_features: usize, n_classes: usize) -> Result<Tree, String> {
    if tree.nodes.is_empty() {
        return Err("no nodes".to_string());
    }

    let len = tree.nodes.len();
    let mut nodes = Vec::with_capacity(len);

    for (i, node) in tree.nodes.iter().enumerate() {
        match node {
            NodeFile::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {}", i, feature));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has non-finite threshold", i));
                }
                // children after parents guarantees traversal terminates
                for child in [*left, *right] {
                    if child <= i || child >= len {
                        return Err(format!("node {} has invalid child {}", i, child));
                    }
                }
                nodes.push(Node::Split {
                    feature: *feature,
                    threshold: *threshold,
                    left: *left,
                    right: *right,
                });
            }
            NodeFile::Leaf { value, .. } => {
                if value.len() != n_classes {
                    return Err(format!(
                        "leaf {} has {} class weights, expected {}",
                        i,
                        value.len(),
                        n_classes
                    ));
                }
                if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(format!("leaf {} has invalid class weights", i));
                }
                let total: f64 = value.iter().sum();
                if total <= 0.0 {
                    return Err(format!("leaf {} is empty", i));
                }
                nodes.push(Node::Leaf {
                    distribution: value.iter().map(|v| v / total).collect(),
                });
            }
        }
    }

    Ok(Tree { nodes })
}

fn node_stats(node: &NodeFile) -> Option<(f64, f64)> {
    match node {
        NodeFile::Split {
            impurity, n_samples, ..
        }
        | NodeFile::Leaf {
            impurity, n_samples, ..
        } => Some(((*impurity)?, (*n_samples)?)),
    }
}

/// Mean decrease in impurity, normalized per tree then across the forest.
///
/// Returns `None` unless every node carries impurity and sample weight.
fn impurity_importances(trees: &[TreeFile], n_features: usize) -> Option<Vec<f64>> {
    let mut forest = vec![0.0; n_features];

    for tree in trees {
        let mut per_tree = vec![0.0; n_features];
        for node in &tree.nodes {
            if let NodeFile::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                let (imp, n) = node_stats(node)?;
                let (imp_l, n_l) = node_stats(&tree.nodes[*left])?;
                let (imp_r, n_r) = node_stats(&tree.nodes[*right])?;
                per_tree[*feature] += (n * imp - n_l * imp_l - n_r * imp_r).max(0.0);
            } else {
                node_stats(node)?;
            }
        }

        let total: f64 = per_tree.iter().sum();
        if total > 0.0 {
            for (f, v) in forest.iter_mut().zip(&per_tree) {
                *f += v / total;
            }
        }
    }

    let total: f64 = forest.iter().sum();
    if total <= 0.0 {
        return None;
    }
    forest.iter_mut().for_each(|v| *v /= total);
    Some(forest)
}
