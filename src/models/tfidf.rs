//! TF-IDF symptom vectorizer

use crate::models::artifacts::{SparseRow, SymptomVectorizer};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Tokens are runs of two or more word characters.
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Row normalisation applied after weighting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    L1,
    None,
}

/// On-disk form of a fitted vectorizer.
#[derive(Debug, Deserialize)]
pub struct TfidfVectorizerData {
    /// Term to column index
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per column; absent means plain term counts
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub norm: Norm,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

/// Fitted TF-IDF vectorizer.
#[derive(Debug)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Option<Vec<f64>>,
    lowercase: bool,
    norm: Norm,
    sublinear_tf: bool,
    ngram_range: (usize, usize),
    token_pattern: Regex,
}

impl TfidfVectorizer {
    /// Build a vectorizer from its fitted parameters, validating their shapes.
    pub fn from_data(data: TfidfVectorizerData) -> Result<Self> {
        let size = data.vocabulary.len();

        if let Some(idf) = &data.idf {
            anyhow::ensure!(
                idf.len() == size,
                "idf has {} entries for a vocabulary of {}",
                idf.len(),
                size
            );
        }

        if let Some((term, &index)) = data.vocabulary.iter().find(|(_, index)| **index >= size) {
            anyhow::bail!("term '{}' maps to column {} outside 0..{}", term, index, size);
        }

        let (min_n, max_n) = data.ngram_range;
        anyhow::ensure!(
            min_n >= 1 && min_n <= max_n,
            "invalid ngram range ({}, {})",
            min_n,
            max_n
        );

        Ok(Self {
            vocabulary: data.vocabulary,
            idf: data.idf,
            lowercase: data.lowercase,
            norm: data.norm,
            sublinear_tf: data.sublinear_tf,
            ngram_range: data.ngram_range,
            token_pattern: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Load a vectorizer from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vectorizer from {:?}", path))?;
        let data: TfidfVectorizerData =
            serde_json::from_str(&raw).context("Failed to parse vectorizer JSON")?;
        Self::from_data(data)
    }

    /// Split a document into the terms the vocabulary is keyed on.
    fn analyze(&self, document: &str) -> Vec<String> {
        let text = if self.lowercase {
            document.to_lowercase()
        } else {
            document.to_string()
        };

        let tokens: Vec<&str> = self
            .token_pattern
            .find_iter(&text)
            .map(|m| m.as_str())
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
        }
        terms
    }

    fn transform_one(&self, document: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyze(document) {
            if let Some(&column) = self.vocabulary.get(&term) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(column, count)| {
                let tf = if self.sublinear_tf { 1.0 + count.ln() } else { count };
                let idf = self.idf.as_ref().map_or(1.0, |idf| idf[column]);
                (column, tf * idf)
            })
            .collect();

        let norm = match self.norm {
            Norm::L2 => row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Norm::L1 => row.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            Norm::None => 1.0,
        };
        if norm > 0.0 {
            for (_, weight) in row.iter_mut() {
                *weight /= norm;
            }
        }

        row
    }
}

impl SymptomVectorizer for TfidfVectorizer {
    fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    fn transform(&self, documents: &[&str]) -> Result<Vec<SparseRow>> {
        Ok(documents.iter().map(|doc| self.transform_one(doc)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer(norm: Norm) -> TfidfVectorizer {
        let vocabulary = [("cough", 0), ("fever", 1), ("headache", 2), ("rash", 3)]
            .into_iter()
            .map(|(t, i)| (t.to_string(), i))
            .collect();

        TfidfVectorizer::from_data(TfidfVectorizerData {
            vocabulary,
            idf: Some(vec![1.0, 2.0, 1.5, 3.0]),
            lowercase: true,
            norm,
            sublinear_tf: false,
            ngram_range: (1, 1),
        })
        .unwrap()
    }

    #[test]
    fn test_tfidf_weights_unnormalised() {
        let v = vectorizer(Norm::None);
        let rows = v.transform(&["Fever, fever and COUGH!"]).unwrap();
        assert_eq!(rows[0], vec![(0, 1.0), (1, 4.0)]);
    }

    #[test]
    fn test_l2_normalisation() {
        let v = vectorizer(Norm::L2);
        let dense = v.transform_dense("fever cough headache").unwrap();

        let norm: f64 = dense.iter().map(|w| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        // raw weights 1.0, 2.0, 1.5 over norm sqrt(7.25)
        assert!((dense[1] - 2.0 / 7.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(dense[3], 0.0);
    }

    #[test]
    fn test_l1_normalisation() {
        let v = vectorizer(Norm::L1);
        let dense = v.transform_dense("fever cough headache").unwrap();

        assert!((dense.iter().map(|w| w.abs()).sum::<f64>() - 1.0).abs() < 1e-12);
        // raw weights 1.0, 2.0, 1.5 over 4.5
        assert!((dense[1] - 2.0 / 4.5).abs() < 1e-12);
        assert!((dense[0] - 1.0 / 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_sublinear_tf() {
        let mut v = vectorizer(Norm::None);
        v.sublinear_tf = true;

        let rows = v.transform(&["fever fever fever cough"]).unwrap();
        // cough: (1 + ln 1) * 1.0, fever: (1 + ln 3) * 2.0
        assert_eq!(rows[0][0], (0, 1.0));
        assert_eq!(rows[0][1].0, 1);
        assert!((rows[0][1].1 - (1.0 + 3f64.ln()) * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_character_and_unknown_tokens_ignored() {
        let v = vectorizer(Norm::L2);
        let rows = v.transform(&["a b fatigue", ""]).unwrap();
        assert!(rows[0].is_empty());
        assert!(rows[1].is_empty());
    }

    #[test]
    fn test_bigrams() {
        let vocabulary = [("sore", 0), ("throat", 1), ("sore throat", 2)]
            .into_iter()
            .map(|(t, i)| (t.to_string(), i))
            .collect();
        let v = TfidfVectorizer::from_data(TfidfVectorizerData {
            vocabulary,
            idf: None,
            lowercase: true,
            norm: Norm::None,
            sublinear_tf: false,
            ngram_range: (1, 2),
        })
        .unwrap();

        let dense = v.transform_dense("Sore throat").unwrap();
        assert_eq!(dense, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rejects_mismatched_idf() {
        let data: TfidfVectorizerData =
            serde_json::from_str(r#"{"vocabulary": {"fever": 0, "cough": 1}, "idf": [1.0]}"#)
                .unwrap();
        assert!(TfidfVectorizer::from_data(data).is_err());
    }

    #[test]
    fn test_json_defaults() {
        let data: TfidfVectorizerData =
            serde_json::from_str(r#"{"vocabulary": {"fever": 0}, "idf": [1.0]}"#).unwrap();
        assert!(data.lowercase);
        assert_eq!(data.norm, Norm::L2);
        assert_eq!(data.ngram_range, (1, 1));
    }
}
