//! Prediction results and the responses served to interactive callers

use crate::error::PipelineError;
use crate::models::ModelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Readmission risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Map a probability onto a tier. Both cut points belong to `Moderate`.
    pub fn from_probability(probability: f64, thresholds: &RiskTierThresholds) -> Self {
        if probability > thresholds.high {
            RiskTier::High
        } else if probability >= thresholds.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }
}

/// Cut points between risk tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskTierThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl Default for RiskTierThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.30,
            high: 0.60,
        }
    }
}

/// Error kind reported for payloads that are not a valid request.
pub const INVALID_REQUEST: &str = "invalid_request";

/// One model's probability and the tier it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub probability: f64,
    pub risk_tier: RiskTier,
}

impl ModelPrediction {
    pub fn new(probability: f64, thresholds: &RiskTierThresholds) -> Self {
        Self {
            probability,
            risk_tier: RiskTier::from_probability(probability, thresholds),
        }
    }
}

/// Per-model predictions for one encounter plus their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPrediction {
    pub models: BTreeMap<ModelId, ModelPrediction>,
    pub probability: f64,
    pub risk_tier: RiskTier,
}

impl PatientPrediction {
    pub fn model_probabilities(&self) -> BTreeMap<ModelId, f64> {
        self.models
            .iter()
            .map(|(id, prediction)| (*id, prediction.probability))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    /// The request itself was at fault; the loaded artifacts are still sound.
    pub fn is_request_level(&self) -> bool {
        matches!(self.kind.as_str(), "unknown_category" | INVALID_REQUEST)
    }

    /// Encoder output disagreed with a model's training layout.
    pub fn is_schema_mismatch(&self) -> bool {
        self.kind == "schema_mismatch"
    }
}

/// Reply sent to an interactive caller.
///
/// An error response never carries a probability, so a failed request can not
/// be mistaken for a low-risk one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub response_id: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PatientPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub scored_at: DateTime<Utc>,
}

impl PredictionResponse {
    pub fn ok(prediction: PatientPrediction) -> Self {
        Self {
            response_id: uuid::Uuid::new_v4().to_string(),
            status: ResponseStatus::Ok,
            prediction: Some(prediction),
            error: None,
            scored_at: Utc::now(),
        }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            response_id: uuid::Uuid::new_v4().to_string(),
            status: ResponseStatus::Error,
            prediction: None,
            error: Some(ErrorBody {
                kind: kind.into(),
                message: message.into(),
            }),
            scored_at: Utc::now(),
        }
    }

    pub fn from_result(result: Result<PatientPrediction, PipelineError>) -> Self {
        match result {
            Ok(prediction) => Self::ok(prediction),
            Err(e) => Self::error(e.kind(), e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// The error body of a failure that points at the artifacts rather than
    /// the request.
    pub fn fatal_error(&self) -> Option<&ErrorBody> {
        self.error.as_ref().filter(|body| !body.is_request_level())
    }
}
