//! Artifact loader: vectorizer, scaler and classifiers from a directory

use crate::config::{ArtifactsConfig, ClassifierEntry};
use crate::error::ArtifactLoadError;
use crate::models::artifacts::{
    Classifier, ClassifierMap, LoadedArtifacts, SymptomVectorizer, VITALS_WIDTH,
};
use crate::models::linear::LinearClassifier;
use crate::models::onnx::OnnxClassifier;
use crate::models::scaler::StandardScaler;
use crate::models::tfidf::TfidfVectorizer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::{info, warn};

static ORT_INIT: Once = Once::new();

/// Loader for the fitted artifacts named in the configuration
pub struct ArtifactLoader {
    /// Number of threads for ONNX inference per model
    onnx_threads: usize,
}

impl ArtifactLoader {
    /// Create a new loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new loader with the given ONNX thread count
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load every configured artifact.
    ///
    /// The vectorizer, the scaler and the mandatory classifier must all load;
    /// any other classifier that is missing or broken is skipped.
    pub fn load(&self, config: &ArtifactsConfig) -> Result<LoadedArtifacts, ArtifactLoadError> {
        let dir = Path::new(&config.dir);

        let vectorizer_path = existing(dir.join(&config.vectorizer))?;
        let vectorizer = TfidfVectorizer::load(&vectorizer_path)
            .map_err(|e| invalid("vectorizer", &vectorizer_path, e))?;
        info!(
            vocabulary_size = vectorizer.vocabulary_size(),
            path = %vectorizer_path.display(),
            "Symptom vectorizer loaded"
        );

        let scaler_path = existing(dir.join(&config.scaler))?;
        let scaler =
            StandardScaler::load(&scaler_path).map_err(|e| invalid("scaler", &scaler_path, e))?;
        info!(path = %scaler_path.display(), "Vitals scaler loaded");

        if !config
            .classifiers
            .iter()
            .any(|entry| entry.name == config.primary_model)
        {
            return Err(ArtifactLoadError::MandatoryNotConfigured(
                config.primary_model.clone(),
            ));
        }

        let feature_width = vectorizer.vocabulary_size() + VITALS_WIDTH;
        let mut classifiers = ClassifierMap::new();

        for entry in &config.classifiers {
            let mandatory = entry.name == config.primary_model;
            match self.load_classifier(dir, entry, feature_width) {
                Ok(model) => {
                    classifiers.insert(entry.name.clone(), model);
                }
                Err(e) if mandatory => return Err(e),
                Err(e) => {
                    warn!(model = %entry.name, error = %e, "Optional classifier unavailable, skipping");
                }
            }
        }

        info!(
            count = classifiers.len(),
            feature_width = feature_width,
            "Loaded {} classifiers from {}",
            classifiers.len(),
            dir.display()
        );

        Ok(LoadedArtifacts::new(
            Arc::new(vectorizer),
            Arc::new(scaler),
            classifiers,
            config.primary_model.clone(),
        ))
    }

    fn load_classifier(
        &self,
        dir: &Path,
        entry: &ClassifierEntry,
        feature_width: usize,
    ) -> Result<Arc<dyn Classifier>, ArtifactLoadError> {
        let path = existing(dir.join(&entry.file))?;

        let model: Arc<dyn Classifier> = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Arc::new(
                LinearClassifier::load(&path).map_err(|e| invalid(&entry.name, &path, e))?,
            ),
            Some("onnx") => {
                ORT_INIT.call_once(|| {
                    if let Err(e) = ort::init().commit() {
                        warn!(error = %e, "ONNX Runtime environment setup failed");
                    }
                });
                Arc::new(
                    OnnxClassifier::load(&path, &entry.name, self.onnx_threads)
                        .map_err(|e| invalid(&entry.name, &path, e))?,
                )
            }
            _ => return Err(ArtifactLoadError::UnsupportedFormat(path)),
        };

        if let Some(expected) = model.n_features() {
            if expected != feature_width {
                return Err(ArtifactLoadError::FeatureMismatch {
                    model: entry.name.clone(),
                    expected,
                    actual: feature_width,
                });
            }
        }

        info!(model = %entry.name, path = %path.display(), "Classifier loaded");
        Ok(model)
    }
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn existing(path: PathBuf) -> Result<PathBuf, ArtifactLoadError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ArtifactLoadError::NotFound(path))
    }
}

fn invalid(artifact: &str, path: &Path, err: anyhow::Error) -> ArtifactLoadError {
    ArtifactLoadError::Invalid {
        artifact: artifact.to_string(),
        path: path.to_path_buf(),
        reason: format!("{:#}", err),
    }
}
