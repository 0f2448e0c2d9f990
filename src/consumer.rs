//! NATS subscriber for incoming prediction requests

use crate::models::InferenceEngine;
use crate::types::{PredictionResponse, RawInput};
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::{debug, error, info, warn};

pub use crate::types::INVALID_REQUEST;

/// Consumer for receiving prediction requests from NATS
pub struct RequestConsumer {
    client: Client,
    subject: String,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to prediction requests");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Turn one request payload into the response sent back to the caller.
///
/// Malformed JSON and scoring errors both become error responses without a
/// probability. Callers must check [`PredictionResponse::fatal_error`]: a
/// schema mismatch means the loaded artifacts drifted apart and serving has
/// to stop.
pub fn respond(engine: &InferenceEngine, payload: &[u8]) -> PredictionResponse {
    let raw: RawInput = match serde_json::from_slice(payload) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize prediction request");
            return PredictionResponse::error(INVALID_REQUEST, e.to_string());
        }
    };

    let result = engine.predict(&raw);
    match &result {
        Err(e) if e.is_record_level() => {
            debug!(kind = e.kind(), error = %e, "Prediction request rejected");
        }
        Err(e) => error!(kind = e.kind(), error = %e, "Prediction failed on loaded artifacts"),
        Ok(_) => {}
    }
    PredictionResponse::from_result(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::types::RiskTier;

    #[test]
    fn test_respond_to_valid_request() {
        let engine = fixtures::engine();
        let payload = serde_json::to_vec(&fixtures::raw_input()).unwrap();

        let response = respond(&engine, &payload);

        assert!(response.is_ok());
        let prediction = response.prediction.unwrap();
        assert_eq!(prediction.models.len(), 3);
        assert_ne!(prediction.risk_tier, RiskTier::High);
    }

    #[test]
    fn test_respond_accepts_corpus_column_names() {
        let engine = fixtures::engine();
        let payload = br#"{
            "time_in_hospital": 3, "n_lab_procedures": 43, "n_procedures": 0,
            "n_medications": 16, "n_outpatient": 0, "n_inpatient": 0,
            "n_emergency": 0, "n_diagnoses": 3, "age": "[70-80)",
            "medical_specialty": "Missing", "diag_1": "Circulatory",
            "change": "no", "diabetes_med": "no", "glucose_test": "no",
            "A1Ctest": "no"
        }"#;

        let response = respond(&engine, payload);
        assert!(response.is_ok());
    }

    #[test]
    fn test_unknown_category_response_has_no_probability() {
        let engine = fixtures::engine();
        let mut raw = fixtures::raw_input();
        raw.age = "[70-80]".to_string();

        let response = respond(&engine, &serde_json::to_vec(&raw).unwrap());

        assert!(!response.is_ok());
        assert!(response.prediction.is_none());
        assert!(response.fatal_error().is_none());
        assert_eq!(response.error.unwrap().kind, "unknown_category");
    }

    #[test]
    fn test_schema_drift_is_reported_as_fatal() {
        let engine = fixtures::drifted_engine();
        let payload = serde_json::to_vec(&fixtures::raw_input()).unwrap();

        for _ in 0..2 {
            let response = respond(&engine, &payload);
            assert!(response.prediction.is_none());
            let body = response.fatal_error().unwrap();
            assert!(body.is_schema_mismatch());
            assert_eq!(body.kind, "schema_mismatch");
        }
    }

    #[test]
    fn test_malformed_payload() {
        let engine = fixtures::engine();
        let response = respond(&engine, b"{\"age\": 70}");

        assert!(!response.is_ok());
        assert!(response.fatal_error().is_none());
        assert_eq!(response.error.unwrap().kind, INVALID_REQUEST);
    }
}
