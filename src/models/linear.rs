//! Logistic regression over the one-hot linear encoding

use crate::error::{PipelineError, Result};
use crate::features::{ColumnSchema, EncodedVector, FeatureStore};
use crate::models::{FittedModel, ModelId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized coefficients as emitted by the training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub feature_store_version: String,
    pub intercept: f64,
    /// Weight per linear column. Reference levels are simply absent.
    pub coefficients: BTreeMap<String, f64>,
}

/// Coefficients aligned to the feature store's linear schema.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    intercept: f64,
    weights: Vec<f64>,
    schema: ColumnSchema,
}

impl LogisticModel {
    /// Align an artifact to `store`. A coefficient for a column outside the
    /// schema means training and inference disagree on the layout.
    pub fn from_artifact(artifact: LogisticArtifact, store: &FeatureStore) -> Result<Self> {
        if !artifact.intercept.is_finite() {
            return Err(PipelineError::schema_mismatch("logistic intercept is not finite"));
        }

        let schema = store.linear_schema().clone();
        let mut weights = vec![0.0; schema.len()];

        for (column, weight) in &artifact.coefficients {
            let index = schema.index_of(column).ok_or_else(|| {
                PipelineError::schema_mismatch(format!(
                    "logistic coefficient '{column}' has no column in the training schema"
                ))
            })?;
            if !weight.is_finite() {
                return Err(PipelineError::schema_mismatch(format!(
                    "logistic coefficient '{column}' is not finite"
                )));
            }
            weights[index] = *weight;
        }

        Ok(Self {
            intercept: artifact.intercept,
            weights,
            schema,
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weight(&self, column: &str) -> Option<f64> {
        self.schema.index_of(column).map(|i| self.weights[i])
    }
}

impl FittedModel for LogisticModel {
    fn id(&self) -> ModelId {
        ModelId::Linear
    }

    fn score(&self, encoded: &EncodedVector) -> Result<f64> {
        let EncodedVector::Linear(vector) = encoded else {
            return Err(PipelineError::schema_mismatch(format!(
                "logistic model needs a linear encoding, got {}",
                encoded.form()
            )));
        };
        vector.conforms_to(&self.schema)?;

        let logit = self.intercept
            + vector
                .values()
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        Ok(sigmoid(logit))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
