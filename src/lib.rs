//! Readmission Prediction Pipeline Library
//!
//! Encodes patient-encounter records against a training-time feature store
//! and scores them with logistic-regression, decision-tree and random-forest
//! classifiers, either in labeled batches (evaluation) or one at a time over
//! NATS.

pub mod config;
pub mod consumer;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod report;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::PipelineError;
pub use evaluation::{EvaluationReport, Evaluator};
pub use features::FeatureStore;
pub use models::{InferenceEngine, ModelId, ModelRegistry};
pub use producer::ResponsePublisher;
pub use types::{
    LabeledRecord, ModelPrediction, PatientPrediction, PredictionResponse, RawInput, RiskTier,
};
