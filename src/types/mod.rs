//! Type definitions for the prediction service

pub mod prediction;
pub mod request;

pub use prediction::{ErrorResponse, ModelPrediction, PredictionResponse, PredictionSet};
pub use request::RawInput;
