//! Raw-input scoring shared by the batch evaluator and the interactive service

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::features::{encode, FeatureStore};
use crate::models::aggregator::ScoreAggregator;
use crate::models::loader::ModelLoader;
use crate::models::registry::ModelRegistry;
use crate::models::ModelId;
use crate::types::{ModelPrediction, PatientPrediction, RawInput, RiskTier, RiskTierThresholds};
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Scores raw inputs against the loaded models.
///
/// The store and registry are read-only, so one engine can be cloned into any
/// number of tasks.
#[derive(Clone)]
pub struct InferenceEngine {
    store: Arc<FeatureStore>,
    registry: Arc<ModelRegistry>,
    aggregator: ScoreAggregator,
    tiers: RiskTierThresholds,
}

impl InferenceEngine {
    pub fn new(
        store: Arc<FeatureStore>,
        registry: Arc<ModelRegistry>,
        aggregator: ScoreAggregator,
        tiers: RiskTierThresholds,
    ) -> Self {
        Self {
            store,
            registry,
            aggregator,
            tiers,
        }
    }

    /// Load the feature store and models named by `config`.
    ///
    /// Fails if any required model is absent.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = FeatureStore::load(&config.artifacts.feature_store)
            .context("Failed to load feature store")?;
        let registry = ModelLoader::new(&store)
            .load_all_models(&config.artifacts.models_dir)
            .context("Failed to load model artifacts")?;
        registry
            .require(&config.models.required)
            .context("Required model missing at startup")?;

        info!(
            version = %store.version(),
            models = ?registry.loaded(),
            "Inference engine initialized"
        );

        Ok(Self::new(
            Arc::new(store),
            Arc::new(registry),
            config.models.aggregator(),
            config.scoring.risk_tiers,
        ))
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn risk_tiers(&self) -> &RiskTierThresholds {
        &self.tiers
    }

    /// Derive, encode in the model's form and score.
    pub fn score(&self, id: ModelId, raw: &RawInput) -> Result<f64> {
        let model = self.registry.get(id)?;
        let encoded = encode(raw, &self.store, model.form())?;
        self.registry.score(id, &encoded)
    }

    /// Score `raw` with every loaded model and map each probability, and
    /// their aggregate, to a tier.
    pub fn predict(&self, raw: &RawInput) -> Result<PatientPrediction> {
        let mut model_probabilities = BTreeMap::new();
        for id in self.registry.loaded() {
            model_probabilities.insert(id, self.score(id, raw)?);
        }

        let probability = self
            .aggregator
            .aggregate(&model_probabilities)
            .ok_or(PipelineError::NothingToAggregate)?;
        let risk_tier = RiskTier::from_probability(probability, &self.tiers);

        debug!(
            probability = probability,
            risk_tier = risk_tier.as_str(),
            spread = ScoreAggregator::spread(&model_probabilities),
            "Prediction complete"
        );

        let models = model_probabilities
            .into_iter()
            .map(|(id, p)| (id, ModelPrediction::new(p, &self.tiers)))
            .collect();

        Ok(PatientPrediction {
            models,
            probability,
            risk_tier,
        })
    }
}
