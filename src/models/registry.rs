//! Registry of loaded classifiers keyed by model id

use crate::error::{PipelineError, Result};
use crate::features::EncodedVector;
use crate::models::{FittedModel, ModelId};
use std::collections::BTreeMap;
use tracing::debug;

/// Holds at most one fitted model per [`ModelId`].
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, Box<dyn FittedModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own id. Registering the same artifact again
    /// leaves the registry in the same state.
    pub fn insert(&mut self, model: Box<dyn FittedModel>) {
        let id = model.id();
        if self.models.insert(id, model).is_some() {
            debug!(model = %id, "Replaced previously loaded model");
        }
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn get(&self, id: ModelId) -> Result<&dyn FittedModel> {
        self.models
            .get(&id)
            .map(|m| &**m)
            .ok_or(PipelineError::ModelNotLoaded(id))
    }

    /// Loaded ids in canonical order.
    pub fn loaded(&self) -> Vec<ModelId> {
        self.models.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Fails with the first id in `required` that is not loaded.
    pub fn require(&self, required: &[ModelId]) -> Result<()> {
        match required.iter().find(|id| !self.contains(**id)) {
            Some(id) => Err(PipelineError::ModelNotLoaded(*id)),
            None => Ok(()),
        }
    }

    /// Probability of the positive class from model `id`.
    pub fn score(&self, id: ModelId, encoded: &EncodedVector) -> Result<f64> {
        let model = self.get(id)?;
        if encoded.form() != model.form() {
            return Err(PipelineError::schema_mismatch(format!(
                "model '{id}' expects {} encoding, got {}",
                model.form(),
                encoded.form()
            )));
        }
        model.score(encoded)
    }
}
