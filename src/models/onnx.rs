//! Classifiers exported to ONNX, run through ONNX Runtime

use crate::models::artifacts::Classifier;
use crate::models::linear::argmax;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{
    DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, ValueType,
};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Classifier backed by an ONNX Runtime session.
///
/// Running a session needs exclusive access, so calls are serialised.
pub struct OnnxClassifier {
    /// Model name
    name: String,
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// Input name for the feature tensor
    input_name: String,
    /// Output name for predicted labels, if the graph has one
    label_output: Option<String>,
    /// Output name for class probabilities
    proba_output: String,
    /// Feature width declared by the graph input, when fixed
    input_width: Option<usize>,
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let input_width = session
            .inputs
            .first()
            .and_then(|i| match &i.input_type {
                ValueType::Tensor { shape, .. } => declared_width(shape),
                _ => None,
            });

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let proba_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone())
            .context("model has no probability output")?;

        info!(
            model = %name,
            input = %input_name,
            input_width = ?input_width,
            label = ?label_output,
            probabilities = %proba_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            label_output,
            proba_output,
            input_width,
        })
    }

    /// Run the graph on a batch and collect labels and probabilities.
    fn run(&self, rows: &[Vec<f64>]) -> Result<(Option<Vec<String>>, Vec<Vec<f64>>)> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        anyhow::ensure!(
            rows.iter().all(|r| r.len() == width),
            "rows have different widths"
        );

        // Prepare input tensor - shape [batch, num_features]
        let data: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
        let shape = vec![rows.len() as i64, width as i64];
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let labels = match &self.label_output {
            Some(name) => self.extract_labels(&outputs, name)?,
            None => None,
        };
        let proba = self.extract_probabilities(&outputs, rows.len())?;

        Ok((labels, proba))
    }

    /// Labels come out as int64 class values or as strings.
    fn extract_labels(&self, outputs: &SessionOutputs, name: &str) -> Result<Option<Vec<String>>> {
        let Some(output) = outputs.get(name) else {
            return Ok(None);
        };

        if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
            return Ok(Some(data.iter().map(|v| v.to_string()).collect()));
        }

        if let Ok((_, strings)) = output.try_extract_strings() {
            return Ok(Some(strings));
        }

        debug!(model = %self.name, output = %name, "Unrecognised label output type");
        Ok(None)
    }

    /// Probabilities come out as a `[batch, classes]` tensor or, with zipmap
    /// enabled, as `seq(map(int64, float))`.
    fn extract_probabilities(&self, outputs: &SessionOutputs, batch: usize) -> Result<Vec<Vec<f64>>> {
        let output = outputs
            .get(self.proba_output.as_str())
            .with_context(|| format!("missing output '{}'", self.proba_output))?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return tensor_rows(shape, data, batch);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.extract_from_sequence_map(output);
        }

        anyhow::bail!("unsupported probability output '{}'", self.proba_output)
    }

    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<Vec<Vec<f64>>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        // one map per row
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

        maps.iter()
            .map(|map_value| -> Result<Vec<f64>> {
                Ok(map_row(map_value.try_extract_key_values::<i64, f32>()?))
            })
            .collect()
    }
}

/// Last input dimension, when the graph fixes it.
fn declared_width(dims: &[i64]) -> Option<usize> {
    dims.last()
        .copied()
        .filter(|&d| d > 0)
        .map(|d| d as usize)
}

/// Split a flat `[batch, classes]` (or `[classes]` for one row) tensor into rows.
fn tensor_rows(dims: &[i64], data: &[f32], batch: usize) -> Result<Vec<Vec<f64>>> {
    let classes = match dims {
        [_, classes] => *classes,
        [classes] if batch == 1 => *classes,
        _ => anyhow::bail!("unexpected probability shape {:?}", dims),
    };
    anyhow::ensure!(
        classes > 0 && data.len() == batch * classes as usize,
        "probability tensor of {} values for {} rows",
        data.len(),
        batch
    );

    Ok(data
        .chunks(classes as usize)
        .map(|row| row.iter().map(|&p| p as f64).collect())
        .collect())
}

/// One `map(int64, float)` row, ordered by class id.
fn map_row(mut pairs: Vec<(i64, f32)>) -> Vec<f64> {
    pairs.sort_by_key(|(class_id, _)| *class_id);
    pairs.into_iter().map(|(_, p)| p as f64).collect()
}

/// Class-index labels for graphs without a label output.
fn index_labels(proba: &[Vec<f64>]) -> Result<Vec<String>> {
    proba
        .iter()
        .map(|row| {
            argmax(row)
                .map(|i| i.to_string())
                .context("empty probability row")
        })
        .collect()
}

impl Classifier for OnnxClassifier {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<String>> {
        let (labels, proba) = self.run(rows)?;
        match labels {
            Some(labels) => Ok(labels),
            // without a label output, fall back to the most probable class index
            None => index_labels(&proba),
        }
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let (_, proba) = self.run(rows)?;
        Ok(proba)
    }

    fn n_features(&self) -> Option<usize> {
        self.input_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_width() {
        assert_eq!(declared_width(&[-1, 15]), Some(15));
        assert_eq!(declared_width(&[1, 15]), Some(15));
        // dynamic feature axis
        assert_eq!(declared_width(&[-1, -1]), None);
        assert_eq!(declared_width(&[]), None);
    }

    #[test]
    fn test_tensor_rows_batched() {
        let rows = tensor_rows(&[2, 3], &[0.1, 0.2, 0.7, 0.5, 0.25, 0.25], 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![0.5, 0.25, 0.25]);
        assert!((rows[0][2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_rows_flat_single_row() {
        let rows = tensor_rows(&[2], &[0.25, 0.75], 1).unwrap();
        assert_eq!(rows, vec![vec![0.25, 0.75]]);

        // a flat tensor is ambiguous for more than one row
        assert!(tensor_rows(&[4], &[0.25, 0.75, 0.5, 0.5], 2).is_err());
    }

    #[test]
    fn test_tensor_rows_bad_shape() {
        assert!(tensor_rows(&[1, 2, 2], &[0.25; 4], 1).is_err());
        assert!(tensor_rows(&[1, 3], &[0.5, 0.5], 1).is_err());
        assert!(tensor_rows(&[1, 0], &[], 1).is_err());
    }

    #[test]
    fn test_map_row_sorted_by_class() {
        let row = map_row(vec![(2, 0.5), (0, 0.25), (1, 0.25)]);
        assert_eq!(row, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_index_labels() {
        let labels = index_labels(&[vec![0.1, 0.6, 0.3], vec![0.5, 0.5]]).unwrap();
        assert_eq!(labels, vec!["1".to_string(), "0".to_string()]);
        assert!(index_labels(&[vec![]]).is_err());
    }
}
