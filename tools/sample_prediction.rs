//! Sample Prediction
//!
//! Loads the configured artifacts, scores one sample patient and prints each
//! model's answer alongside the preferred (ensemble, else logistic) result.

use anyhow::Context;
use serde_json::json;
use symptom_prediction_service::{
    config::AppConfig, feature_extractor::FeatureEncoder, models::inference::PredictionService,
    types::request::RawInput,
};
use tracing::info;

/// Headline model order: ensemble when loaded, otherwise logistic.
const PREFERENCE: [&str; 2] = ["ensemble", "logistic"];

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.logging.init()?;

    let service =
        PredictionService::from_config(&config.artifacts).context("Failed to load models")?;
    let artifacts = service.artifacts();

    let sample = json!({
        "symptoms": "fever cough headache",
        "age": 45,
        "gender": "male",
        "severity": "moderate",
        "temperature": 38.5,
        "heart_rate": 85,
        "blood_pressure": "120/80",
        "oxygen_saturation": 95
    });

    let raw = RawInput::from_payload(&sample)?;
    let features = FeatureEncoder::new().encode(
        &raw,
        artifacts.vectorizer.as_ref(),
        artifacts.scaler.as_ref(),
    )?;

    info!(
        feature_width = artifacts.feature_width(),
        features = features.len(),
        models = ?artifacts.model_names(),
        "Sample encoded"
    );

    let predictions = service.encode_and_predict(&sample)?;
    let (primary_model, primary) = predictions
        .preferred(&PREFERENCE)
        .context("no preferred model answered")?;

    println!("Feature vector length: {}", features.len());
    println!("Prediction Results:");
    println!("Predicted Disease: {} ({})", primary.label, primary_model);
    println!("Confidence: {:.4}", primary.confidence);
    println!("All Model Predictions:");
    for name in predictions.model_names() {
        if let Some(prediction) = predictions.get(name) {
            println!(
                "  {} -> Disease: {} | Confidence: {:.4}",
                name, prediction.label, prediction.confidence
            );
        }
    }

    Ok(())
}
