//! Prediction aggregation across every loaded classifier

use crate::error::AggregationError;
use crate::models::artifacts::{Classifier, ClassifierMap};
use crate::types::prediction::{ModelPrediction, PredictionSet};
use anyhow::{Context, Result};
use tracing::{debug, error, warn};

/// Runs a feature vector through each classifier and collects their answers.
pub struct PredictionAggregator {
    /// Classifier whose failure fails the whole request
    mandatory_model: String,
}

impl PredictionAggregator {
    pub fn new(mandatory_model: impl Into<String>) -> Self {
        Self {
            mandatory_model: mandatory_model.into(),
        }
    }

    /// Score `features` with every classifier.
    ///
    /// The mandatory classifier must be present and must succeed. Any other
    /// classifier that fails is logged and left out of the result.
    pub fn predict(
        &self,
        features: &[f64],
        classifiers: &ClassifierMap,
    ) -> Result<PredictionSet, AggregationError> {
        if !classifiers.contains_key(&self.mandatory_model) {
            return Err(AggregationError::MandatoryMissing(self.mandatory_model.clone()));
        }

        let batch = vec![features.to_vec()];
        let mut predictions = PredictionSet::new();

        for (name, classifier) in classifiers {
            match run_single_model(classifier.as_ref(), &batch) {
                Ok(prediction) => {
                    predictions.insert(name.clone(), prediction);
                }
                Err(e) if *name == self.mandatory_model => {
                    error!(model = %name, error = %e, "Mandatory classifier failed");
                    return Err(AggregationError::MandatoryFailed {
                        model: name.clone(),
                        reason: format!("{:#}", e),
                    });
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "Optional classifier failed, omitting");
                }
            }
        }

        debug!(models = ?predictions.model_names(), "Aggregation complete");
        Ok(predictions)
    }
}

/// Label from `predict`, confidence as the largest class probability.
fn run_single_model(classifier: &dyn Classifier, batch: &[Vec<f64>]) -> Result<ModelPrediction> {
    let label = classifier
        .predict(batch)?
        .into_iter()
        .next()
        .context("classifier returned no label")?;

    let proba = classifier
        .predict_proba(batch)?
        .into_iter()
        .next()
        .context("classifier returned no probabilities")?;

    let confidence = proba
        .iter()
        .copied()
        .fold(None, |max: Option<f64>, p| Some(max.map_or(p, |m| m.max(p))))
        .context("classifier returned an empty probability row")?;

    anyhow::ensure!(
        (0.0..=1.0).contains(&confidence),
        "confidence {} outside [0, 1]",
        confidence
    );

    Ok(ModelPrediction::new(label, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifacts::fakes::{FailingClassifier, FixedClassifier};
    use std::sync::Arc;

    fn classifiers(with_ensemble: bool) -> ClassifierMap {
        let mut map = ClassifierMap::new();
        map.insert(
            "logistic".to_string(),
            Arc::new(FixedClassifier {
                label: "Influenza",
                proba: vec![0.1, 0.7, 0.2],
            }) as Arc<dyn Classifier>,
        );
        if with_ensemble {
            map.insert(
                "ensemble".to_string(),
                Arc::new(FixedClassifier {
                    label: "Common Cold",
                    proba: vec![0.55, 0.25, 0.2],
                }) as Arc<dyn Classifier>,
            );
        }
        map
    }

    #[test]
    fn test_one_entry_per_classifier() {
        let aggregator = PredictionAggregator::new("logistic");
        let result = aggregator.predict(&[0.0; 4], &classifiers(true)).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("logistic").unwrap().label, "Influenza");
        assert_eq!(result.get("logistic").unwrap().confidence, 0.7);
        assert_eq!(result.get("ensemble").unwrap().confidence, 0.55);
        assert!(result.iter().all(|(_, p)| (0.0..=1.0).contains(&p.confidence)));
    }

    #[test]
    fn test_only_mandatory_loaded() {
        let aggregator = PredictionAggregator::new("logistic");
        let result = aggregator.predict(&[0.0; 4], &classifiers(false)).unwrap();
        assert_eq!(result.model_names(), vec!["logistic"]);
    }

    #[test]
    fn test_missing_mandatory() {
        let aggregator = PredictionAggregator::new("logistic");
        let mut map = classifiers(true);
        map.remove("logistic");

        let result = aggregator.predict(&[0.0; 4], &map);
        assert!(matches!(result, Err(AggregationError::MandatoryMissing(ref m)) if m == "logistic"));
    }

    #[test]
    fn test_failing_mandatory() {
        let aggregator = PredictionAggregator::new("logistic");
        let mut map = classifiers(true);
        map.insert("logistic".to_string(), Arc::new(FailingClassifier));

        let result = aggregator.predict(&[0.0; 4], &map);
        assert!(matches!(result, Err(AggregationError::MandatoryFailed { .. })));
    }

    #[test]
    fn test_failing_optional_is_omitted() {
        let aggregator = PredictionAggregator::new("logistic");
        let mut map = classifiers(false);
        map.insert("ensemble".to_string(), Arc::new(FailingClassifier));

        let result = aggregator.predict(&[0.0; 4], &map).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.get("ensemble").is_none());
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let bad = FixedClassifier {
            label: "Influenza",
            proba: vec![1.5, -0.5],
        };
        assert!(run_single_model(&bad, &[vec![0.0]]).is_err());

        let empty = FixedClassifier {
            label: "Influenza",
            proba: vec![],
        };
        assert!(run_single_model(&empty, &[vec![0.0]]).is_err());
    }
}
