//! Prediction result and reply data structures

use crate::error::{ErrorKind, PredictionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One classifier's answer for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Predicted disease label
    #[serde(rename = "prediction")]
    pub label: String,

    /// Highest class probability (0.0 - 1.0), not calibrated
    pub confidence: f64,
}

impl ModelPrediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Predictions keyed by model name, one entry per classifier that answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionSet {
    predictions: HashMap<String, ModelPrediction>,
}

impl PredictionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, prediction: ModelPrediction) {
        self.predictions.insert(model.into(), prediction);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPrediction> {
        self.predictions.get(model)
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelPrediction)> {
        self.predictions.iter()
    }

    /// Model names present in this set, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predictions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The first prediction present in `preference` order.
    ///
    /// Used to pick the headline result, e.g. `["ensemble", "logistic"]`.
    pub fn preferred(&self, preference: &[&str]) -> Option<(&str, &ModelPrediction)> {
        preference
            .iter()
            .find_map(|name| self.predictions.get_key_value(*name))
            .map(|(name, prediction)| (name.as_str(), prediction))
    }

    /// Whether every model predicted the same label.
    pub fn unanimous(&self) -> bool {
        let mut labels = self.predictions.values().map(|p| p.label.as_str());
        match labels.next() {
            Some(first) => labels.all(|label| label == first),
            None => true,
        }
    }
}

/// Successful reply to a prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Unique reply identifier
    pub request_id: String,

    /// Reply generation timestamp
    pub timestamp: DateTime<Utc>,

    /// Per-model predictions
    pub result: PredictionSet,
}

impl PredictionResponse {
    pub fn new(result: PredictionSet) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            result,
        }
    }
}

/// Error reply to a prediction request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Unique reply identifier
    pub request_id: String,

    /// Human-readable failure
    pub error: String,

    /// Failure class
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            error: error.into(),
            kind,
        }
    }
}

impl From<&PredictionError> for ErrorResponse {
    fn from(err: &PredictionError) -> Self {
        Self::new(err.to_string(), err.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodingError;

    fn sample_set() -> PredictionSet {
        let mut set = PredictionSet::new();
        set.insert("logistic", ModelPrediction::new("Influenza", 0.72));
        set.insert("ensemble", ModelPrediction::new("Influenza", 0.64));
        set
    }

    #[test]
    fn test_preferred_prediction() {
        let set = sample_set();
        let (name, prediction) = set.preferred(&["ensemble", "logistic"]).unwrap();
        assert_eq!(name, "ensemble");
        assert_eq!(prediction.confidence, 0.64);

        let mut logistic_only = PredictionSet::new();
        logistic_only.insert("logistic", ModelPrediction::new("Migraine", 0.5));
        let (name, _) = logistic_only.preferred(&["ensemble", "logistic"]).unwrap();
        assert_eq!(name, "logistic");

        assert!(PredictionSet::new().preferred(&["ensemble"]).is_none());
    }

    #[test]
    fn test_unanimous() {
        let mut set = sample_set();
        assert!(set.unanimous());
        set.insert("ensemble", ModelPrediction::new("Common Cold", 0.4));
        assert!(!set.unanimous());
    }

    #[test]
    fn test_response_wire_format() {
        let response = PredictionResponse::new(sample_set());
        let json: serde_json::Value = serde_json::to_value(&response).unwrap();

        assert_eq!(json["result"]["logistic"]["prediction"], "Influenza");
        assert_eq!(json["result"]["ensemble"]["confidence"], 0.64);
        assert!(json["request_id"].is_string());
    }

    #[test]
    fn test_error_response() {
        let err = PredictionError::from(EncodingError::InvalidPayload);
        let response = ErrorResponse::from(&err);
        let json: serde_json::Value = serde_json::to_value(&response).unwrap();

        assert_eq!(json["kind"], "bad_input");
        assert!(json["error"].as_str().unwrap().contains("JSON object"));
    }
}
