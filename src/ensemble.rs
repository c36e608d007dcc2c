//! Gradient-boosted residual model: arena trees and deterministic evaluation.
//!
//! Each tree is a flat `Vec<TreeNode>` addressed by index with the root at 0.
//! Validation requires every child index to be strictly greater than its
//! parent's and inside the arena, which rules out cycles and dangling
//! references by index checks alone. Once built, a tree is never mutated and
//! descent cannot fail.
//!
//! Prediction: `bias + Σ learning_rate × leaf(tree_i, x)`, summed in stored
//! tree order so the floating-point result is reproducible. An averaged model
//! holds two such boosters and returns the mean of their predictions.
//!
//! Two tree layouts lower into the same arena:
//!
//! - **nested**: `{"split": {"feature", "threshold", "left", "right"}}` /
//!   `{"leaf": {"value"}}`
//! - **flat**: `[{"feat", "threshold", "left", "right", "value"}, ...]` with
//!   `left == right == -1` marking a leaf (the legacy exporter's layout)

use serde::Deserialize;

use crate::error::ModelError;
use crate::features::{FeatureVector, ModelFeature};

/// Arena node. Children index into the owning tree's node vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// One validated regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// Validate an arena. `tree` is only used to label errors.
    pub fn new(tree: usize, nodes: Vec<TreeNode>, feature_count: usize) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::EmptyTree { tree });
        }
        let len = nodes.len();
        for (node, n) in nodes.iter().enumerate() {
            match *n {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= feature_count {
                        return Err(ModelError::FeatureOutOfRange {
                            tree,
                            node,
                            feature: feature as i64,
                            count: feature_count,
                        });
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::NonFiniteNode {
                            tree,
                            node,
                            what: "threshold",
                        });
                    }
                    for child in [left, right] {
                        let child = child as usize;
                        if child <= node {
                            return Err(ModelError::BackwardChild {
                                tree,
                                node,
                                child: child as i64,
                            });
                        }
                        if child >= len {
                            return Err(ModelError::DanglingChild {
                                tree,
                                node,
                                child: child as i64,
                            });
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ModelError::NonFiniteNode {
                            tree,
                            node,
                            what: "leaf value",
                        });
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Descend from the root: `<=` goes left, `>` goes right.
    #[inline]
    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold {
                        left as usize
                    } else {
                        right as usize
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        // Children always follow their parent, so one forward pass suffices.
        let mut depth = vec![0usize; self.nodes.len()];
        let mut max = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = *node {
                for child in [left as usize, right as usize] {
                    depth[child] = depth[child].max(depth[i] + 1);
                    max = max.max(depth[child]);
                }
            }
        }
        max
    }
}

/// One gradient-boosted member: `bias + Σ learning_rate × leaf(tree_i, x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Booster {
    bias: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl Booster {
    /// Validate scalars and every tree against `feature_count` inputs.
    pub fn new(
        bias: f64,
        learning_rate: f64,
        trees: Vec<Vec<TreeNode>>,
        feature_count: usize,
    ) -> Result<Self, ModelError> {
        if !bias.is_finite() {
            return Err(ModelError::NonFiniteScalar("bias"));
        }
        if !learning_rate.is_finite() {
            return Err(ModelError::NonFiniteScalar("learning rate"));
        }
        let trees = trees
            .into_iter()
            .enumerate()
            .map(|(i, nodes)| Tree::new(i, nodes, feature_count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            bias,
            learning_rate,
            trees,
        })
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut acc = self.bias;
        for tree in &self.trees {
            acc += tree.leaf_value(row) * self.learning_rate;
        }
        acc
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Deepest tree, in edges.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }
}

/// Immutable residual model: one booster, or several whose predictions are
/// averaged in stored order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleModel {
    features: Vec<ModelFeature>,
    boosters: Vec<Booster>,
}

impl EnsembleModel {
    /// Single-booster model.
    pub fn new(
        features: Vec<ModelFeature>,
        bias: f64,
        learning_rate: f64,
        trees: Vec<Vec<TreeNode>>,
    ) -> Result<Self, ModelError> {
        if features.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        let booster = Booster::new(bias, learning_rate, trees, features.len())?;
        Self::from_boosters(features, vec![booster])
    }

    /// Model averaging already-validated boosters over one feature layout.
    pub fn from_boosters(
        features: Vec<ModelFeature>,
        boosters: Vec<Booster>,
    ) -> Result<Self, ModelError> {
        if features.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        if boosters.is_empty() {
            return Err(ModelError::NoBoosters);
        }
        Ok(Self { features, boosters })
    }

    /// Lower a parsed artifact into validated arenas.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let features = artifact
            .features()
            .iter()
            .map(|name| {
                ModelFeature::from_name(name).ok_or_else(|| ModelError::UnknownFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let count = features.len();
        let boosters = match artifact {
            ModelArtifact::Averaged { model1, model2, .. } => {
                vec![model1.lower(count)?, model2.lower(count)?]
            }
            ModelArtifact::Single {
                bias,
                learning_rate,
                trees,
                ..
            } => vec![BoosterSpec {
                bias,
                learning_rate,
                trees,
            }
            .lower(count)?],
        };
        Self::from_boosters(features, boosters)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Self::from_artifact(serde_json::from_str(json)?)
    }

    /// Raw residual for one trip.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let row = features.model_inputs(&self.features);
        if let [only] = self.boosters.as_slice() {
            return only.predict_row(&row);
        }
        let mut sum = 0.0;
        for booster in &self.boosters {
            sum += booster.predict_row(&row);
        }
        sum / self.boosters.len() as f64
    }

    pub fn features(&self) -> &[ModelFeature] {
        &self.features
    }

    pub fn boosters(&self) -> &[Booster] {
        &self.boosters
    }

    pub fn tree_count(&self) -> usize {
        self.boosters.iter().map(|b| b.trees.len()).sum()
    }
}

// ── Artifact layouts ────────────────────────────────────────────────────

/// On-disk model description. Unknown keys (`shrink`, `cap`, `n_estimators`,
/// `max_depth`, `is_ensemble`) are ignored.
///
/// The averaged layout nests two boosters under `model1` and `model2` and
/// shares the top-level `features`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelArtifact {
    Averaged {
        features: Vec<String>,
        model1: BoosterSpec,
        model2: BoosterSpec,
    },
    Single {
        features: Vec<String>,
        #[serde(alias = "init_prediction")]
        bias: f64,
        learning_rate: f64,
        trees: Vec<TreeSpec>,
    },
}

impl ModelArtifact {
    pub fn features(&self) -> &[String] {
        match self {
            ModelArtifact::Averaged { features, .. } | ModelArtifact::Single { features, .. } => {
                features
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoosterSpec {
    #[serde(alias = "init_prediction")]
    pub bias: f64,
    pub learning_rate: f64,
    pub trees: Vec<TreeSpec>,
}

impl BoosterSpec {
    fn lower(self, feature_count: usize) -> Result<Booster, ModelError> {
        let trees = self
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, spec)| spec.into_arena(i, feature_count))
            .collect::<Result<Vec<_>, _>>()?;
        Booster::new(self.bias, self.learning_rate, trees, feature_count)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeSpec {
    Flat(Vec<FlatNode>),
    Nested(NodeSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<NodeSpec>,
        right: Box<NodeSpec>,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatNode {
    pub feat: i64,
    pub threshold: f64,
    pub left: i64,
    pub right: i64,
    #[serde(default)]
    pub value: f64,
}

const NO_CHILD: i64 = -1;

impl TreeSpec {
    fn into_arena(self, tree: usize, feature_count: usize) -> Result<Vec<TreeNode>, ModelError> {
        match self {
            TreeSpec::Nested(root) => {
                let mut nodes = Vec::new();
                push_nested(root, &mut nodes);
                Ok(nodes)
            }
            TreeSpec::Flat(flat) => flat
                .iter()
                .enumerate()
                .map(|(node, n)| lower_flat(tree, node, n, flat.len(), feature_count))
                .collect(),
        }
    }
}

/// Pre-order push: the parent slot is reserved first, so children always land
/// at larger indices.
fn push_nested(spec: NodeSpec, nodes: &mut Vec<TreeNode>) -> u32 {
    let idx = nodes.len() as u32;
    match spec {
        NodeSpec::Leaf { value } => nodes.push(TreeNode::Leaf { value }),
        NodeSpec::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            nodes.push(TreeNode::Leaf { value: 0.0 });
            let left = push_nested(*left, nodes);
            let right = push_nested(*right, nodes);
            nodes[idx as usize] = TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            };
        }
    }
    idx
}

fn lower_flat(
    tree: usize,
    node: usize,
    n: &FlatNode,
    len: usize,
    feature_count: usize,
) -> Result<TreeNode, ModelError> {
    match (n.left == NO_CHILD, n.right == NO_CHILD) {
        (true, true) => Ok(TreeNode::Leaf { value: n.value }),
        (false, false) => {
            let feature = usize::try_from(n.feat).map_err(|_| ModelError::FeatureOutOfRange {
                tree,
                node,
                feature: n.feat,
                count: feature_count,
            })?;
            Ok(TreeNode::Split {
                feature,
                threshold: n.threshold,
                left: flat_child(tree, node, n.left, len)?,
                right: flat_child(tree, node, n.right, len)?,
            })
        }
        _ => Err(ModelError::HalfLeaf { tree, node }),
    }
}

fn flat_child(tree: usize, node: usize, child: i64, len: usize) -> Result<u32, ModelError> {
    if child < 0 || child as u64 >= len as u64 || child > u32::MAX as i64 {
        return Err(ModelError::DanglingChild { tree, node, child });
    }
    Ok(child as u32)
}
