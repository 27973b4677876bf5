//! Feature encoding for symptom-to-disease model inference.
//!
//! Turns a patient's symptom text and vital signs into the vector the
//! classifiers were trained on. Layout, left to right:
//!
//! | columns       | content                                      |
//! |---------------|----------------------------------------------|
//! | `0..V`        | symptom text weights, vocabulary order, raw  |
//! | `V`           | blood pressure average `(sys + dia) / 2`     |
//! | `V+1`         | heart rate                                   |
//! | `V+2`         | age                                          |
//! | `V+3`         | temperature                                  |
//! | `V+4`         | oxygen saturation                            |
//!
//! Only the five vital-sign columns go through the scaler.

use crate::error::EncodingError;
use crate::models::artifacts::{SymptomVectorizer, VitalsScaler, VITALS_WIDTH};
use crate::types::request::RawInput;
use tracing::debug;

/// Names of the vital-sign columns, in layout order.
pub const VITAL_NAMES: [&str; VITALS_WIDTH] = [
    "blood_pressure_avg",
    "heart_rate",
    "age",
    "temperature",
    "oxygen_saturation",
];

/// Average of a `"<systolic>/<diastolic>"` reading.
///
/// Anything other than exactly two integers around one `/` gives 0.
/// Integers of any length are accepted.
pub fn blood_pressure_average(reading: &str) -> f64 {
    let mut parts = reading.split('/');
    let parsed = match (parts.next(), parts.next(), parts.next()) {
        (Some(sys), Some(dia), None) => parse_integer(sys).zip(parse_integer(dia)),
        _ => None,
    };

    match parsed {
        Some((sys, dia)) => (sys + dia) / 2.0,
        None => {
            debug!(blood_pressure = %reading, "Unparseable blood pressure, using 0");
            0.0
        }
    }
}

/// Integer text (optional sign, digits with single `_` separators) as a float.
fn parse_integer(text: &str) -> Option<f64> {
    let text = text.trim();
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);

    let well_formed = !digits.is_empty()
        && digits.split('_').all(|group| {
            !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit())
        });
    if !well_formed {
        return None;
    }

    text.replace('_', "").parse::<f64>().ok()
}

/// Feature encoder that transforms patient input into model input features.
///
/// Holds no state of its own; the fitted artifacts are passed in per call.
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Create a new feature encoder.
    pub fn new() -> Self {
        Self
    }

    /// The five vital-sign values before scaling.
    pub fn vitals(&self, raw: &RawInput) -> [f64; VITALS_WIDTH] {
        [
            blood_pressure_average(&raw.blood_pressure),
            raw.heart_rate,
            raw.age,
            raw.temperature,
            raw.oxygen_saturation,
        ]
    }

    /// Encode one input into a feature vector of `vocabulary_size + 5` values.
    ///
    /// Returns no partial result: if either transform fails the whole
    /// request is rejected.
    pub fn encode(
        &self,
        raw: &RawInput,
        vectorizer: &dyn SymptomVectorizer,
        scaler: &dyn VitalsScaler,
    ) -> Result<Vec<f64>, EncodingError> {
        let vocabulary_size = vectorizer.vocabulary_size();

        let text = vectorizer
            .transform_dense(&raw.symptoms)
            .map_err(|e| EncodingError::TextTransform(e.to_string()))?;
        if text.len() != vocabulary_size {
            return Err(EncodingError::TextTransform(format!(
                "expected {} columns, got {}",
                vocabulary_size,
                text.len()
            )));
        }

        let scaled = scaler
            .transform(&[self.vitals(raw)])
            .map_err(|e| EncodingError::VitalsTransform(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EncodingError::VitalsTransform("scaler returned no rows".into()))?;
        if let Some(column) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(EncodingError::VitalsTransform(format!(
                "scaled {} is {}",
                VITAL_NAMES[column], scaled[column]
            )));
        }

        let mut features = Vec::with_capacity(self.feature_count(vocabulary_size));
        features.extend(text);
        features.extend(scaled);
        Ok(features)
    }

    /// Get the number of features produced for a given vocabulary size.
    pub fn feature_count(&self, vocabulary_size: usize) -> usize {
        vocabulary_size + VITALS_WIDTH
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}
