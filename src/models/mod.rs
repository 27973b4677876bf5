//! Fitted artifacts and multi-model inference components

pub mod aggregator;
pub mod artifacts;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod onnx;
pub mod scaler;
pub mod tfidf;

pub use aggregator::PredictionAggregator;
pub use artifacts::{Classifier, LoadedArtifacts, SymptomVectorizer, VitalsScaler};
pub use inference::PredictionService;
pub use loader::ArtifactLoader;
