//! Record and prediction types shared by the batch and interactive paths

pub mod prediction;
pub mod record;

pub use prediction::{
    ErrorBody, ModelPrediction, PatientPrediction, PredictionResponse, RiskTier,
    RiskTierThresholds, INVALID_REQUEST,
};
pub use record::{CategoricalField, LabeledRecord, NumericField, RawInput, OUTCOME_FIELD};
