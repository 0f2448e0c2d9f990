//! Score aggregation across the loaded classifiers

use crate::models::ModelId;
use std::collections::{BTreeMap, HashMap};

/// Combines per-model probabilities into a single probability.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    /// Model weights for weighted average
    weights: HashMap<ModelId, f64>,
    /// Weight for models not in the weights map
    default_weight: f64,
}

impl ScoreAggregator {
    /// Create a new score aggregator with model weights.
    pub fn new(weights: HashMap<ModelId, f64>) -> Self {
        Self {
            weights,
            default_weight: 1.0,
        }
    }

    /// Plain mean of the model probabilities.
    pub fn equal_weights() -> Self {
        Self::new(HashMap::new())
    }

    /// Weighted average with weights normalized over the models present.
    ///
    /// Returns `None` when there is nothing to aggregate.
    pub fn aggregate(&self, model_scores: &BTreeMap<ModelId, f64>) -> Option<f64> {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for (id, &score) in model_scores {
            let weight = self.weight(*id);
            weighted_sum += score * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            Some((weighted_sum / total_weight).clamp(0.0, 1.0))
        } else {
            None
        }
    }

    /// Spread between the most and least confident model.
    pub fn spread(model_scores: &BTreeMap<ModelId, f64>) -> f64 {
        let max = model_scores.values().copied().fold(f64::MIN, f64::max);
        let min = model_scores.values().copied().fold(f64::MAX, f64::min);
        if model_scores.is_empty() {
            0.0
        } else {
            max - min
        }
    }

    pub fn weight(&self, id: ModelId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(self.default_weight)
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::equal_weights()
    }
}
