//! Capability traits for fitted artifacts and the loaded artifact set

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Number of vital-sign features appended after the text block.
pub const VITALS_WIDTH: usize = 5;

/// Sparse row of `(column, weight)` pairs, columns ascending.
pub type SparseRow = Vec<(usize, f64)>;

/// Fitted text-to-vector transformer over a learned vocabulary.
pub trait SymptomVectorizer: Send + Sync {
    /// Number of columns produced per document.
    fn vocabulary_size(&self) -> usize;

    /// Transform a batch of documents into sparse rows.
    fn transform(&self, documents: &[&str]) -> Result<Vec<SparseRow>>;

    /// Transform one document and expand it to a dense row.
    fn transform_dense(&self, document: &str) -> Result<Vec<f64>> {
        let rows = self.transform(&[document])?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("vectorizer returned no rows"))?;

        let mut dense = vec![0.0; self.vocabulary_size()];
        for (column, weight) in row {
            let slot = dense
                .get_mut(column)
                .ok_or_else(|| anyhow::anyhow!("column {} outside vocabulary", column))?;
            *slot = weight;
        }
        Ok(dense)
    }
}

/// Fitted per-column scaler for the vital-sign block.
pub trait VitalsScaler: Send + Sync {
    fn transform(&self, rows: &[[f64; VITALS_WIDTH]]) -> Result<Vec<[f64; VITALS_WIDTH]>>;
}

/// Fitted classifier producing labels and class probabilities.
pub trait Classifier: Send + Sync {
    /// Predicted label per row.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<String>>;

    /// Class probabilities per row.
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;

    /// Input width the classifier was fitted on, when known.
    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// Classifiers keyed by model name.
pub type ClassifierMap = HashMap<String, Arc<dyn Classifier>>;

/// Every artifact the service needs, loaded once and never mutated.
pub struct LoadedArtifacts {
    pub vectorizer: Arc<dyn SymptomVectorizer>,
    pub scaler: Arc<dyn VitalsScaler>,
    pub classifiers: ClassifierMap,
    /// Name of the classifier that must answer every request
    pub mandatory_model: String,
}

impl LoadedArtifacts {
    pub fn new(
        vectorizer: Arc<dyn SymptomVectorizer>,
        scaler: Arc<dyn VitalsScaler>,
        classifiers: ClassifierMap,
        mandatory_model: impl Into<String>,
    ) -> Self {
        Self {
            vectorizer,
            scaler,
            classifiers,
            mandatory_model: mandatory_model.into(),
        }
    }

    /// Width of every encoded feature vector.
    pub fn feature_width(&self) -> usize {
        self.vectorizer.vocabulary_size() + VITALS_WIDTH
    }

    /// Loaded model names, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classifiers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for LoadedArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedArtifacts")
            .field("vocabulary_size", &self.vectorizer.vocabulary_size())
            .field("classifiers", &self.model_names())
            .field("mandatory_model", &self.mandatory_model)
            .finish()
    }
}
