//! Configuration management for the readmission pipeline

use crate::models::{ModelId, ScoreAggregator};
use crate::types::RiskTierThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub models: ModelsConfig,
    pub scoring: ScoringConfig,
    pub nats: NatsConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// Locations of the training artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Feature store JSON (vocabularies and schemas)
    pub feature_store: PathBuf,
    /// Directory containing the model JSON files
    pub models_dir: PathBuf,
}

/// Model selection and aggregation
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Models that must load at startup
    #[serde(default = "default_required_models")]
    pub required: Vec<ModelId>,
    /// Aggregation weights; models not listed weigh 1.0
    #[serde(default)]
    pub weights: HashMap<ModelId, f64>,
}

fn default_required_models() -> Vec<ModelId> {
    ModelId::ALL.to_vec()
}

impl ModelsConfig {
    pub fn aggregator(&self) -> ScoreAggregator {
        ScoreAggregator::new(self.weights.clone())
    }
}

/// Decision rules applied to probabilities
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Probability at or above which a record is classified positive
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
    #[serde(default)]
    pub risk_tiers: RiskTierThresholds,
}

fn default_decision_threshold() -> f64 {
    0.5
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject for responses to requests without a reply inbox
    pub response_subject: String,
}

/// Interactive service settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of requests scored concurrently
    pub workers: usize,
    /// Seconds between metric summaries
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.scoring.decision_threshold;
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "decision_threshold {threshold} must lie in [0, 1]"
        );

        let tiers = &self.scoring.risk_tiers;
        ensure!(
            0.0 <= tiers.moderate && tiers.moderate <= tiers.high && tiers.high <= 1.0,
            "risk tier cut points must satisfy 0 <= moderate <= high <= 1"
        );

        for (id, weight) in &self.models.weights {
            ensure!(
                weight.is_finite() && *weight > 0.0,
                "weight for model '{id}' must be positive"
            );
        }

        ensure!(self.service.workers > 0, "service.workers must be at least 1");
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig {
                feature_store: PathBuf::from("artifacts/feature_store.json"),
                models_dir: PathBuf::from("artifacts/models"),
            },
            models: ModelsConfig {
                required: default_required_models(),
                weights: HashMap::new(),
            },
            scoring: ScoringConfig {
                decision_threshold: default_decision_threshold(),
                risk_tiers: RiskTierThresholds::default(),
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "readmission.predict".to_string(),
                response_subject: "readmission.predictions".to_string(),
            },
            service: ServiceConfig {
                workers: 4,
                report_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scoring.decision_threshold, 0.5);
        assert_eq!(config.scoring.risk_tiers.moderate, 0.30);
        assert_eq!(config.scoring.risk_tiers.high, 0.60);
        assert_eq!(config.models.required, ModelId::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[artifacts]
feature_store = "store.json"
models_dir = "models"

[models]
required = ["linear", "tree"]

[models.weights]
linear = 2.0

[scoring]
decision_threshold = 0.4
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();

        assert_eq!(config.artifacts.feature_store, PathBuf::from("store.json"));
        assert_eq!(config.models.required, vec![ModelId::Linear, ModelId::Tree]);
        assert_eq!(config.models.aggregator().weight(ModelId::Linear), 2.0);
        assert_eq!(config.models.aggregator().weight(ModelId::Ensemble), 1.0);
        assert_eq!(config.scoring.decision_threshold, 0.4);
        assert_eq!(config.scoring.risk_tiers, RiskTierThresholds::default());
        assert_eq!(config.nats.request_subject, "readmission.predict");
    }

    #[test]
    fn test_invalid_tiers_rejected() {
        let mut config = AppConfig::default();
        config.scoring.risk_tiers.moderate = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(config.service.workers, 4);
    }
}
