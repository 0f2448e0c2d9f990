//! CART decision tree and random forest over the tree encoding

use crate::error::{PipelineError, Result};
use crate::features::{EncodedVector, FeatureStore, TreeColumn, TreeRecord, TreeValue};
use crate::models::{FittedModel, ModelId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node of a serialized tree. Children are indices into the same node list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    /// `value <= threshold` goes left
    Numeric {
        field: String,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Levels in `left_levels` go left
    Categorical {
        field: String,
        left_levels: Vec<String>,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub feature_store_version: String,
    pub fields: Vec<String>,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub feature_store_version: String,
    pub fields: Vec<String>,
    pub trees: Vec<Vec<NodeSpec>>,
}

#[derive(Debug, Clone)]
enum Node {
    Numeric {
        index: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Categorical {
        index: usize,
        left_levels: Vec<String>,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

/// A validated tree whose split fields are resolved to tree-schema positions.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Resolve and validate serialized nodes against `store`.
    ///
    /// Children must point forward, which rules out cycles. A split on the
    /// outcome column is rejected, which keeps the placeholder inert.
    pub fn compile(specs: &[NodeSpec], store: &FeatureStore) -> std::result::Result<Self, String> {
        if specs.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        let schema = store.tree_schema();
        let resolve = |field: &str| -> std::result::Result<(usize, TreeColumn), String> {
            let index = schema
                .position(field)
                .ok_or_else(|| format!("split field '{field}' is not in the tree schema"))?;
            let column = schema.columns()[index];
            if column == TreeColumn::Outcome {
                return Err(format!("tree splits on the outcome column '{field}'"));
            }
            Ok((index, column))
        };
        let check_children = |at: usize, left: usize, right: usize| {
            for child in [left, right] {
                if child <= at || child >= specs.len() {
                    return Err(format!("node {at} has invalid child index {child}"));
                }
            }
            Ok(())
        };

        let mut nodes = Vec::with_capacity(specs.len());
        for (at, spec) in specs.iter().enumerate() {
            let node = match spec {
                NodeSpec::Numeric {
                    field,
                    threshold,
                    left,
                    right,
                } => {
                    let (index, column) = resolve(field)?;
                    if !column.is_numeric() {
                        return Err(format!("numeric split on categorical field '{field}'"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {at} has a non-finite threshold"));
                    }
                    check_children(at, *left, *right)?;
                    Node::Numeric {
                        index,
                        threshold: *threshold,
                        left: *left,
                        right: *right,
                    }
                }
                NodeSpec::Categorical {
                    field,
                    left_levels,
                    left,
                    right,
                } => {
                    let (index, column) = resolve(field)?;
                    let TreeColumn::Categorical(categorical) = column else {
                        return Err(format!("categorical split on numeric field '{field}'"));
                    };
                    let vocab = store.vocabulary(categorical);
                    if let Some(level) = left_levels.iter().find(|l| !vocab.contains(l)) {
                        return Err(format!(
                            "split level '{level}' is not in the vocabulary of '{field}'"
                        ));
                    }
                    check_children(at, *left, *right)?;
                    Node::Categorical {
                        index,
                        left_levels: left_levels.clone(),
                        left: *left,
                        right: *right,
                    }
                }
                NodeSpec::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!("leaf {at} probability {probability} outside [0, 1]"));
                    }
                    Node::Leaf {
                        probability: *probability,
                    }
                }
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }

    /// Leaf probability reached by `record`.
    pub fn predict(&self, record: &TreeRecord) -> Result<f64> {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { probability } => return Ok(*probability),
                Node::Numeric {
                    index,
                    threshold,
                    left,
                    right,
                } => {
                    let Some(TreeValue::Numeric(value)) = record.value(*index) else {
                        return Err(PipelineError::schema_mismatch(format!(
                            "tree field {index} is not numeric"
                        )));
                    };
                    at = if *value <= *threshold { *left } else { *right };
                }
                Node::Categorical {
                    index,
                    left_levels,
                    left,
                    right,
                } => {
                    let Some(TreeValue::Level(level)) = record.value(*index) else {
                        return Err(PipelineError::schema_mismatch(format!(
                            "tree field {index} is not categorical"
                        )));
                    };
                    at = if left_levels.contains(level) { *left } else { *right };
                }
            }
        }
    }
}

fn check_fields(fields: &[String], store: &FeatureStore) -> Result<Vec<TreeColumn>> {
    let expected = store.tree_schema().names();
    if fields.len() != expected.len() || fields.iter().zip(&expected).any(|(a, b)| a != b) {
        return Err(PipelineError::schema_mismatch(format!(
            "tree model fields {fields:?} differ from the tree schema {expected:?}"
        )));
    }
    Ok(store.tree_schema().columns().to_vec())
}

fn tree_record<'a>(
    encoded: &'a EncodedVector,
    fields: &[TreeColumn],
    id: ModelId,
) -> Result<&'a TreeRecord> {
    let EncodedVector::Tree(record) = encoded else {
        return Err(PipelineError::schema_mismatch(format!(
            "{id} model needs a tree encoding, got {}",
            encoded.form()
        )));
    };
    if record.len() != fields.len() || !record.columns().eq(fields.iter().copied()) {
        return Err(PipelineError::schema_mismatch(format!(
            "{id} model received fields that differ from its training fields"
        )));
    }
    Ok(record)
}

fn invalid(source: &Path, reason: String) -> PipelineError {
    PipelineError::InvalidArtifact {
        path: source.to_path_buf(),
        reason,
    }
}

/// Single classification tree.
#[derive(Debug, Clone)]
pub struct TreeModel {
    tree: DecisionTree,
    fields: Vec<TreeColumn>,
}

impl TreeModel {
    pub fn from_artifact(artifact: TreeArtifact, store: &FeatureStore, source: &Path) -> Result<Self> {
        let fields = check_fields(&artifact.fields, store)?;
        let tree = DecisionTree::compile(&artifact.nodes, store).map_err(|r| invalid(source, r))?;
        Ok(Self { tree, fields })
    }
}

impl FittedModel for TreeModel {
    fn id(&self) -> ModelId {
        ModelId::Tree
    }

    fn score(&self, encoded: &EncodedVector) -> Result<f64> {
        let record = tree_record(encoded, &self.fields, self.id())?;
        self.tree.predict(record)
    }
}

/// Bagged trees; the probability is the mean of the per-tree leaf probabilities.
#[derive(Debug, Clone)]
pub struct ForestModel {
    trees: Vec<DecisionTree>,
    fields: Vec<TreeColumn>,
}

impl ForestModel {
    pub fn from_artifact(
        artifact: ForestArtifact,
        store: &FeatureStore,
        source: &Path,
    ) -> Result<Self> {
        let fields = check_fields(&artifact.fields, store)?;
        if artifact.trees.is_empty() {
            return Err(invalid(source, "forest has no trees".to_string()));
        }
        let trees = artifact
            .trees
            .iter()
            .enumerate()
            .map(|(i, nodes)| {
                DecisionTree::compile(nodes, store).map_err(|r| invalid(source, format!("tree {i}: {r}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { trees, fields })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl FittedModel for ForestModel {
    fn id(&self) -> ModelId {
        ModelId::Ensemble
    }

    fn score(&self, encoded: &EncodedVector) -> Result<f64> {
        let record = tree_record(encoded, &self.fields, self.id())?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict(record)?;
        }
        Ok((total / self.trees.len() as f64).clamp(0.0, 1.0))
    }
}
