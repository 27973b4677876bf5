//! Error types surfaced by the prediction core.
//!
//! Per-field input problems never appear here: the request parsers replace
//! malformed or missing fields with defaults. Everything below rejects the
//! whole request (or, for [`ArtifactLoadError`], the whole startup).

use std::path::PathBuf;
use thiserror::Error;

/// How a surfaced error should be reported by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request cannot be served as given.
    BadInput,
    /// The service is not in a state to answer.
    Unavailable,
}

/// Failure while turning a request into a feature vector.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("request payload must be a JSON object")]
    InvalidPayload,
    #[error("symptom transform failed: {0}")]
    TextTransform(String),
    #[error("vitals transform failed: {0}")]
    VitalsTransform(String),
}

/// Failure while scoring a feature vector.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("mandatory classifier '{0}' is not loaded")]
    MandatoryMissing(String),
    #[error("mandatory classifier '{model}' failed: {reason}")]
    MandatoryFailed { model: String, reason: String },
}

/// Failure of the combined encode-and-predict operation.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("invalid input data: {0}")]
    Encoding(#[from] EncodingError),
    #[error("prediction failed: {0}")]
    Aggregation(#[from] AggregationError),
}

impl PredictionError {
    /// Classify the failure for the transport layer.
    ///
    /// Encoding failures are reported against the input. Once the input is
    /// encoded, a mandatory classifier that is missing or fails is a fault on
    /// the service side.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Encoding(_) => ErrorKind::BadInput,
            PredictionError::Aggregation(_) => ErrorKind::Unavailable,
        }
    }
}

/// Failure while loading the artifacts at startup or on reload.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("artifact file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load {artifact} from {}: {reason}", .path.display())]
    Invalid {
        artifact: String,
        path: PathBuf,
        reason: String,
    },
    #[error("mandatory classifier '{0}' is not configured")]
    MandatoryNotConfigured(String),
    #[error("unsupported classifier format for {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("classifier '{model}' expects {expected} features but the encoder produces {actual}")]
    FeatureMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let missing: PredictionError = AggregationError::MandatoryMissing("logistic".into()).into();
        assert_eq!(missing.kind(), ErrorKind::Unavailable);

        let failed: PredictionError = AggregationError::MandatoryFailed {
            model: "logistic".into(),
            reason: "shape".into(),
        }
        .into();
        assert_eq!(failed.kind(), ErrorKind::Unavailable);

        let bad: PredictionError = EncodingError::InvalidPayload.into();
        assert_eq!(bad.kind(), ErrorKind::BadInput);

        let transform: PredictionError = EncodingError::VitalsTransform("nan".into()).into();
        assert_eq!(transform.kind(), ErrorKind::BadInput);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::BadInput).unwrap(),
            "\"bad_input\""
        );
    }
}
