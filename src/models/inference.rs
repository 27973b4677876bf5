//! Prediction service: encode a request and score it with every model

use crate::config::ArtifactsConfig;
use crate::error::{ArtifactLoadError, PredictionError};
use crate::feature_extractor::FeatureEncoder;
use crate::models::aggregator::PredictionAggregator;
use crate::models::artifacts::LoadedArtifacts;
use crate::models::loader::ArtifactLoader;
use crate::types::prediction::PredictionSet;
use crate::types::request::RawInput;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Entry point used by the transport layer.
///
/// Each request takes one snapshot of the artifacts; a reload replaces the
/// whole set at once so no request sees a mix of old and new artifacts.
pub struct PredictionService {
    artifacts: RwLock<Arc<LoadedArtifacts>>,
    encoder: FeatureEncoder,
}

impl PredictionService {
    pub fn new(artifacts: LoadedArtifacts) -> Self {
        info!(artifacts = ?artifacts, "Prediction service initialized");
        Self {
            artifacts: RwLock::new(Arc::new(artifacts)),
            encoder: FeatureEncoder::new(),
        }
    }

    /// Load the artifacts described by `config` and build a service on them.
    pub fn from_config(config: &ArtifactsConfig) -> Result<Self, ArtifactLoadError> {
        let loader = ArtifactLoader::with_threads(config.onnx_threads);
        Ok(Self::new(loader.load(config)?))
    }

    /// Current artifact set.
    pub fn artifacts(&self) -> Arc<LoadedArtifacts> {
        match self.artifacts.read() {
            Ok(guard) => Arc::clone(&guard),
            // the guarded value is only ever replaced whole, so it is intact
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new artifact set.
    pub fn reload(&self, artifacts: LoadedArtifacts) {
        let artifacts = Arc::new(artifacts);
        match self.artifacts.write() {
            Ok(mut guard) => *guard = artifacts,
            Err(poisoned) => *poisoned.into_inner() = artifacts,
        }
        info!("Artifacts reloaded");
    }

    /// Load a new artifact set and swap it in; on failure the current set stays.
    pub fn reload_from(&self, config: &ArtifactsConfig) -> Result<(), ArtifactLoadError> {
        let loader = ArtifactLoader::with_threads(config.onnx_threads);
        let artifacts = loader.load(config)?;
        self.reload(artifacts);
        Ok(())
    }

    /// Get loaded model names
    pub fn model_names(&self) -> Vec<String> {
        self.artifacts().model_names()
    }

    /// Encode a decoded request payload and score it with every classifier.
    pub fn encode_and_predict(&self, payload: &Value) -> Result<PredictionSet, PredictionError> {
        let raw = RawInput::from_payload(payload)?;
        self.predict(&raw)
    }

    /// Encode an input and score it with every classifier.
    pub fn predict(&self, raw: &RawInput) -> Result<PredictionSet, PredictionError> {
        let artifacts = self.artifacts();

        let features = self.encoder.encode(
            raw,
            artifacts.vectorizer.as_ref(),
            artifacts.scaler.as_ref(),
        )?;

        let aggregator = PredictionAggregator::new(artifacts.mandatory_model.as_str());
        let predictions = aggregator.predict(&features, &artifacts.classifiers)?;

        debug!(
            features = features.len(),
            models = predictions.len(),
            "Request scored"
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AggregationError, EncodingError, ErrorKind};
    use crate::models::artifacts::fakes::{CountingVectorizer, FixedClassifier, OffsetScaler};
    use crate::models::artifacts::{Classifier, ClassifierMap};
    use serde_json::json;

    fn artifacts(label: &'static str, models: &[&str]) -> LoadedArtifacts {
        let mut classifiers = ClassifierMap::new();
        for name in models {
            classifiers.insert(
                name.to_string(),
                Arc::new(FixedClassifier {
                    label,
                    proba: vec![0.2, 0.8],
                }) as Arc<dyn Classifier>,
            );
        }

        LoadedArtifacts::new(
            Arc::new(CountingVectorizer {
                vocabulary: vec!["cough", "fever"],
            }),
            Arc::new(OffsetScaler(0.0)),
            classifiers,
            "logistic",
        )
    }

    #[test]
    fn test_encode_and_predict() {
        let service = PredictionService::new(artifacts("Influenza", &["logistic", "ensemble"]));
        let result = service
            .encode_and_predict(&json!({"symptoms": "fever", "blood_pressure": "120/80"}))
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("ensemble").unwrap().label, "Influenza");
        assert_eq!(service.model_names(), vec!["ensemble", "logistic"]);
    }

    #[test]
    fn test_invalid_payload() {
        let service = PredictionService::new(artifacts("Influenza", &["logistic"]));
        let err = service.encode_and_predict(&json!("fever")).unwrap_err();

        assert!(matches!(err, PredictionError::Encoding(EncodingError::InvalidPayload)));
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[test]
    fn test_missing_mandatory_is_unavailable() {
        let service = PredictionService::new(artifacts("Influenza", &["ensemble"]));
        let err = service.encode_and_predict(&json!({})).unwrap_err();

        assert!(matches!(
            err,
            PredictionError::Aggregation(AggregationError::MandatoryMissing(_))
        ));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_reload_swaps_whole_set() {
        let service = PredictionService::new(artifacts("Influenza", &["logistic"]));
        let before = service.artifacts();

        service.reload(artifacts("Migraine", &["logistic"]));

        let result = service.encode_and_predict(&json!({})).unwrap();
        assert_eq!(result.get("logistic").unwrap().label, "Migraine");
        // snapshots taken before the swap keep working on the old set
        assert_eq!(before.classifiers.len(), 1);
        assert!(!Arc::ptr_eq(&before, &service.artifacts()));
    }
}
