//! Standard scaler for the vital-sign block

use crate::models::artifacts::{VitalsScaler, VITALS_WIDTH};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Fitted centering and scaling statistics, one entry per vital sign.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; VITALS_WIDTH],
    pub scale: [f64; VITALS_WIDTH],
    #[serde(default = "default_true")]
    pub with_mean: bool,
    #[serde(default = "default_true")]
    pub with_std: bool,
}

fn default_true() -> bool {
    true
}

impl StandardScaler {
    pub fn new(mean: [f64; VITALS_WIDTH], scale: [f64; VITALS_WIDTH]) -> Self {
        Self {
            mean,
            scale,
            with_mean: true,
            with_std: true,
        }
    }

    /// Load a scaler from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler from {:?}", path))?;
        let scaler: Self = serde_json::from_str(&raw).context("Failed to parse scaler JSON")?;

        anyhow::ensure!(
            scaler.mean.iter().chain(scaler.scale.iter()).all(|v| v.is_finite()),
            "scaler statistics must be finite"
        );
        Ok(scaler)
    }

    fn transform_row(&self, row: &[f64; VITALS_WIDTH]) -> [f64; VITALS_WIDTH] {
        let mut out = *row;
        for (i, value) in out.iter_mut().enumerate() {
            if self.with_mean {
                *value -= self.mean[i];
            }
            // constant training columns are left unscaled
            if self.with_std && self.scale[i] != 0.0 {
                *value /= self.scale[i];
            }
        }
        out
    }
}

impl VitalsScaler for StandardScaler {
    fn transform(&self, rows: &[[f64; VITALS_WIDTH]]) -> Result<Vec<[f64; VITALS_WIDTH]>> {
        Ok(rows.iter().map(|row| self.transform_row(row)).collect())
    }
}
