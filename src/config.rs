//! Configuration management for the prediction service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file, overridable with `SYMPTOM_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject that triggers an artifact reload
    #[serde(default)]
    pub reload_subject: Option<String>,
    /// Queue group shared by service replicas
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// One classifier file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassifierEntry {
    /// Model name used as the key in every prediction set
    pub name: String,
    /// File name inside the artifacts directory (`.json` or `.onnx`)
    pub file: String,
}

/// Fitted artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory containing artifact files
    pub dir: String,
    /// Symptom vectorizer file
    pub vectorizer: String,
    /// Vitals scaler file
    pub scaler: String,
    /// Classifier that must load and answer every request (default: logistic)
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// All classifiers, mandatory one included
    pub classifiers: Vec<ClassifierEntry>,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_primary_model() -> String {
    "logistic".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests handled concurrently
    pub workers: usize,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LoggingConfig {
    /// Install the global tracing subscriber; `RUST_LOG` directives are kept
    pub fn init(&self) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(format!("symptom_prediction_service={}", self.level).parse()?);
        let builder = tracing_subscriber::fmt().with_env_filter(filter);

        let installed = if self.format == "json" {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| anyhow::anyhow!(e))
    }
}

impl AppConfig {
    /// Load configuration from `SYMPTOM_CONFIG` or the default file
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("SYMPTOM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `SYMPTOM__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("SYMPTOM").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "symptoms.predict".to_string(),
                reload_subject: Some("symptoms.reload".to_string()),
                queue_group: Some("symptom-predictors".to_string()),
            },
            artifacts: ArtifactsConfig {
                dir: "models".to_string(),
                vectorizer: "symptom_vectorizer.json".to_string(),
                scaler: "medical_scaler.json".to_string(),
                primary_model: default_primary_model(),
                classifiers: vec![
                    ClassifierEntry {
                        name: "logistic".to_string(),
                        file: "logistic_demo.json".to_string(),
                    },
                    ClassifierEntry {
                        name: "ensemble".to_string(),
                        file: "ensemble_medical_model.onnx".to_string(),
                    },
                ],
                onnx_threads: 1,
            },
            pipeline: PipelineConfig { workers: 4 },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.artifacts.primary_model, "logistic");
        assert_eq!(config.artifacts.classifiers.len(), 2);
        assert_eq!(config.metrics.report_interval_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
request_subject = "predict"

[artifacts]
dir = "/srv/models"
vectorizer = "v.json"
scaler = "s.json"
classifiers = [{{ name = "logistic", file = "lr.json" }}]

[pipeline]
workers = 8

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.request_subject, "predict");
        assert_eq!(config.nats.reload_subject, None);
        assert_eq!(config.nats.queue_group, None);
        assert_eq!(config.artifacts.primary_model, "logistic");
        assert_eq!(config.artifacts.onnx_threads, 1);
        assert_eq!(
            config.artifacts.classifiers,
            vec![ClassifierEntry {
                name: "logistic".into(),
                file: "lr.json".into()
            }]
        );
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.metrics.report_interval_secs, 30);
    }
}
