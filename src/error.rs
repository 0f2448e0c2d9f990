//! Error taxonomy for encoding, scoring and artifact loading

use crate::models::ModelId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the feature store, encoders, models and evaluation service.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A categorical value outside the trained vocabulary.
    #[error("value '{value}' is not a trained level of field '{field}'")]
    UnknownCategory { field: String, value: String },

    /// Encoded output or a model artifact disagrees with the training-time schema.
    #[error("encoded layout does not match the training schema: {detail}")]
    SchemaMismatch { detail: String },

    /// The requested model artifact was never loaded into the registry.
    #[error("model '{0}' is not loaded")]
    ModelNotLoaded(ModelId),

    /// No loaded model carries a positive aggregation weight.
    #[error("no loaded model contributes to the aggregate probability")]
    NothingToAggregate,

    #[error("failed to read artifact {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    /// The training corpus can not define a complete vocabulary.
    #[error("training corpus can not define a feature store: {0}")]
    InvalidCorpus(String),
}

impl PipelineError {
    pub fn unknown_category(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn schema_mismatch(detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            detail: detail.into(),
        }
    }

    /// Errors that only invalidate a single record. Everything else aborts a batch.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::UnknownCategory { .. })
    }

    /// Stable machine-readable name used in service responses and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCategory { .. } => "unknown_category",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::ModelNotLoaded(_) | Self::NothingToAggregate => "model_not_loaded",
            Self::ArtifactIo { .. } | Self::ArtifactFormat { .. } | Self::InvalidArtifact { .. } => {
                "artifact"
            }
            Self::InvalidCorpus(_) => "corpus",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_category_is_record_level() {
        assert!(PipelineError::unknown_category("age", "[0-10)").is_record_level());
        assert!(!PipelineError::schema_mismatch("extra column").is_record_level());
        assert!(!PipelineError::ModelNotLoaded(ModelId::Tree).is_record_level());
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::unknown_category("medical_specialty", "Nonexistent-Dept");
        assert_eq!(
            err.to_string(),
            "value 'Nonexistent-Dept' is not a trained level of field 'medical_specialty'"
        );
        assert_eq!(err.kind(), "unknown_category");
        assert_eq!(
            PipelineError::ModelNotLoaded(ModelId::Ensemble).to_string(),
            "model 'ensemble' is not loaded"
        );
    }
}
