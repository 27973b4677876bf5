//! Symptom Prediction Service Library
//!
//! Encodes a patient's symptom text and vital signs into a feature vector
//! and scores it with every loaded disease classifier.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{AggregationError, ArtifactLoadError, EncodingError, ErrorKind, PredictionError};
pub use feature_extractor::FeatureEncoder;
pub use models::inference::PredictionService;
pub use producer::ReplyPublisher;
pub use types::{prediction::PredictionSet, request::RawInput};
