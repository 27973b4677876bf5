//! Patient request data structures

use crate::error::EncodingError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Blood pressure used when the field is absent or not text.
pub const DEFAULT_BLOOD_PRESSURE: &str = "0/0";

/// A patient's symptoms and vital signs, as decoded from a request payload.
///
/// Construction from a payload never fails on individual fields: anything
/// absent or malformed degrades to its default (`""`, `"0/0"` or `0.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    /// Free-text symptom description
    pub symptoms: String,

    /// Blood pressure formatted `"<systolic>/<diastolic>"`
    pub blood_pressure: String,

    /// Heart rate in beats per minute
    pub heart_rate: f64,

    /// Age in years
    pub age: f64,

    /// Body temperature
    pub temperature: f64,

    /// Oxygen saturation percentage
    pub oxygen_saturation: f64,
}

impl RawInput {
    /// Create an input with only symptom text; vitals take their defaults.
    pub fn new(symptoms: impl Into<String>) -> Self {
        Self {
            symptoms: symptoms.into(),
            ..Self::default()
        }
    }

    /// Set the vital signs.
    pub fn with_vitals(
        mut self,
        blood_pressure: impl Into<String>,
        heart_rate: f64,
        age: f64,
        temperature: f64,
        oxygen_saturation: f64,
    ) -> Self {
        self.blood_pressure = blood_pressure.into();
        self.heart_rate = heart_rate;
        self.age = age;
        self.temperature = temperature;
        self.oxygen_saturation = oxygen_saturation;
        self
    }

    /// Build an input from a decoded JSON payload.
    ///
    /// Only a payload that is not an object is rejected.
    pub fn from_payload(payload: &Value) -> Result<Self, EncodingError> {
        let fields = payload.as_object().ok_or(EncodingError::InvalidPayload)?;
        Ok(Self::from_fields(fields))
    }

    /// Build an input from payload fields, substituting defaults per field.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let symptoms = match fields.get("symptoms") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                debug!(value = %other, "Non-text symptoms field, using empty text");
                String::new()
            }
        };

        let blood_pressure = match fields.get("blood_pressure") {
            Some(Value::String(bp)) => bp.clone(),
            _ => DEFAULT_BLOOD_PRESSURE.to_string(),
        };

        Self {
            symptoms,
            blood_pressure,
            heart_rate: coerce_vital(fields.get("heart_rate")),
            age: coerce_vital(fields.get("age")),
            temperature: coerce_vital(fields.get("temperature")),
            oxygen_saturation: coerce_vital(fields.get("oxygen_saturation")),
        }
    }
}

impl Default for RawInput {
    fn default() -> Self {
        Self {
            symptoms: String::new(),
            blood_pressure: DEFAULT_BLOOD_PRESSURE.to_string(),
            heart_rate: 0.0,
            age: 0.0,
            temperature: 0.0,
            oxygen_saturation: 0.0,
        }
    }
}

/// Coerce a vital-sign field to a float.
///
/// Numbers pass through unchanged, numeric strings are parsed after trimming
/// whitespace. Absent, null, boolean, non-numeric or non-finite values are 0.
pub fn coerce_vital(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}
