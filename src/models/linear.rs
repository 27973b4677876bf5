//! Linear (logistic regression) classifier stored as JSON coefficients

use crate::models::artifacts::Classifier;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// How per-class scores become probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiClass {
    /// Softmax over all class scores
    Multinomial,
    /// Independent logistic per class, normalised to sum to 1
    Ovr,
}

/// Fitted logistic regression.
///
/// A single coefficient row means a binary model over two classes. Without
/// an explicit `multi_class`, binary models use the plain logistic function
/// and larger ones use softmax.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub multi_class: Option<MultiClass>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

impl LinearClassifier {
    /// Load and validate a classifier from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read classifier from {:?}", path))?;
        let model: Self =
            serde_json::from_str(&raw).context("Failed to parse classifier JSON")?;
        model.validate()?;
        Ok(model)
    }

    /// Check coefficient shapes against the class list.
    pub fn validate(&self) -> Result<()> {
        let n_classes = self.classes.len();
        anyhow::ensure!(n_classes >= 2, "need at least two classes, got {}", n_classes);

        let expected_rows = if n_classes == 2 { 1 } else { n_classes };
        anyhow::ensure!(
            self.coef.len() == expected_rows || self.coef.len() == n_classes,
            "{} coefficient rows for {} classes",
            self.coef.len(),
            n_classes
        );
        anyhow::ensure!(
            self.intercept.len() == self.coef.len(),
            "{} intercepts for {} coefficient rows",
            self.intercept.len(),
            self.coef.len()
        );

        let width = self.coef[0].len();
        anyhow::ensure!(
            self.coef.iter().all(|row| row.len() == width),
            "coefficient rows have different widths"
        );
        Ok(())
    }

    fn decision_function(&self, row: &[f64]) -> Result<Vec<f64>> {
        let width = self.coef[0].len();
        anyhow::ensure!(
            row.len() == width,
            "expected {} features, got {}",
            width,
            row.len()
        );

        Ok(self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(weights, b)| weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect())
    }

    fn probabilities(&self, row: &[f64]) -> Result<Vec<f64>> {
        let scores = self.decision_function(row)?;

        if scores.len() == 1 {
            // softmax over [-d, d] is the logistic of 2d
            let d = match self.multi_class {
                Some(MultiClass::Multinomial) => 2.0 * scores[0],
                _ => scores[0],
            };
            let p = sigmoid(d);
            return Ok(vec![1.0 - p, p]);
        }

        Ok(match self.multi_class.unwrap_or(MultiClass::Multinomial) {
            MultiClass::Multinomial => softmax(&scores),
            MultiClass::Ovr => {
                let raw: Vec<f64> = scores.into_iter().map(sigmoid).collect();
                let sum: f64 = raw.iter().sum();
                raw.into_iter().map(|p| p / sum).collect()
            }
        })
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<String>> {
        rows.iter()
            .map(|row| {
                let proba = self.probabilities(row)?;
                let best = argmax(&proba).context("empty probability row")?;
                Ok(self.classes[best].clone())
            })
            .collect()
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.probabilities(row)).collect()
    }

    fn n_features(&self) -> Option<usize> {
        self.coef.first().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_class() -> LinearClassifier {
        LinearClassifier {
            classes: vec!["Common Cold".into(), "Influenza".into(), "Migraine".into()],
            coef: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
            intercept: vec![0.0, 0.0, 0.0],
            multi_class: Some(MultiClass::Multinomial),
        }
    }

    #[test]
    fn test_multinomial_prediction() {
        let model = three_class();
        model.validate().unwrap();

        let rows = vec![vec![0.0, 2.0]];
        assert_eq!(model.predict(&rows).unwrap(), vec!["Influenza".to_string()]);

        let proba = &model.predict_proba(&rows).unwrap()[0];
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(argmax(proba), Some(1));
    }

    #[test]
    fn test_binary_prediction() {
        let model = LinearClassifier {
            classes: vec!["Healthy".into(), "Pneumonia".into()],
            coef: vec![vec![2.0]],
            intercept: vec![0.0],
            multi_class: None,
        };
        model.validate().unwrap();

        let proba = model.predict_proba(&[vec![0.0]]).unwrap();
        assert_eq!(proba[0], vec![0.5, 0.5]);
        // ties go to the first class
        assert_eq!(model.predict(&[vec![0.0]]).unwrap()[0], "Healthy");
        assert_eq!(model.predict(&[vec![1.0]]).unwrap()[0], "Pneumonia");
    }

    #[test]
    fn test_binary_multinomial_doubles_margin() {
        let mut model = LinearClassifier {
            classes: vec!["Healthy".into(), "Pneumonia".into()],
            coef: vec![vec![1.0]],
            intercept: vec![0.0],
            multi_class: Some(MultiClass::Multinomial),
        };

        let proba = model.predict_proba(&[vec![1.0]]).unwrap();
        assert!((proba[0][1] - 0.880797).abs() < 1e-6);
        assert!((proba[0][0] - 0.119203).abs() < 1e-6);

        model.multi_class = Some(MultiClass::Ovr);
        let proba = model.predict_proba(&[vec![1.0]]).unwrap();
        assert!((proba[0][1] - 0.731059).abs() < 1e-6);
    }

    #[test]
    fn test_multi_class_from_json() {
        let model: LinearClassifier = serde_json::from_str(
            r#"{"classes": ["a", "b"], "coef": [[1.0]], "intercept": [0.0], "multi_class": "multinomial"}"#,
        )
        .unwrap();
        assert_eq!(model.multi_class, Some(MultiClass::Multinomial));

        let model: LinearClassifier =
            serde_json::from_str(r#"{"classes": ["a", "b"], "coef": [[1.0]], "intercept": [0.0]}"#)
                .unwrap();
        assert_eq!(model.multi_class, None);
    }

    #[test]
    fn test_ovr_normalised() {
        let mut model = three_class();
        model.multi_class = Some(MultiClass::Ovr);

        let proba = model.predict_proba(&[vec![1.0, 0.5]]).unwrap();
        assert!((proba[0].iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&[vec![1.0, 0.5]]).unwrap()[0], "Common Cold");
    }

    #[test]
    fn test_wrong_width_rejected() {
        let model = three_class();
        assert!(model.predict(&[vec![1.0, 2.0, 3.0]]).is_err());
        assert_eq!(model.n_features(), Some(2));
    }

    #[test]
    fn test_validate_shapes() {
        let mut model = three_class();
        model.intercept.pop();
        assert!(model.validate().is_err());
    }
}
