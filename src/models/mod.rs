//! Fitted classifiers and the registry that serves them

pub mod aggregator;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod registry;
pub mod tree;

use crate::error::Result;
use crate::features::{EncodedVector, EncodingForm};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use aggregator::ScoreAggregator;
pub use inference::InferenceEngine;
pub use linear::LogisticModel;
pub use loader::ModelLoader;
pub use registry::ModelRegistry;
pub use tree::{DecisionTree, ForestModel, TreeModel};

/// The three classifier families the pipeline serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    /// Logistic regression
    Linear,
    /// Single CART tree
    Tree,
    /// Random forest
    Ensemble,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Linear, ModelId::Tree, ModelId::Ensemble];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Linear => "linear",
            ModelId::Tree => "tree",
            ModelId::Ensemble => "ensemble",
        }
    }

    /// Artifact file name inside the models directory.
    pub fn artifact_file(self) -> &'static str {
        match self {
            ModelId::Linear => "logistic_regression.json",
            ModelId::Tree => "decision_tree.json",
            ModelId::Ensemble => "random_forest.json",
        }
    }

    /// Encoding the model family consumes.
    pub fn form(self) -> EncodingForm {
        match self {
            ModelId::Linear => EncodingForm::Linear,
            ModelId::Tree | ModelId::Ensemble => EncodingForm::Tree,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown model '{s}' (expected linear, tree or ensemble)"))
    }
}

/// An immutable trained classifier.
///
/// Scoring takes `&self` only; implementations hold no interior mutability, so
/// a model can be shared across threads and scored in any order.
pub trait FittedModel: Send + Sync {
    fn id(&self) -> ModelId;

    fn form(&self) -> EncodingForm {
        self.id().form()
    }

    /// Probability of the positive class, in [0, 1].
    fn score(&self, encoded: &EncodedVector) -> Result<f64>;
}
