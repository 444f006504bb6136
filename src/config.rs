//! Configuration management for the procurement risk service

use crate::store::DEFAULT_HISTORY_LIMIT;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub models: ModelsConfig,
    pub training: TrainingConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Request subject for scoring transactions
    pub score_subject: String,
    /// Request subject for prediction lookups by id
    pub lookup_subject: String,
    /// Request subject for vendor history queries
    pub history_subject: String,
    /// Subject anomalous predictions are published to
    pub alert_subject: String,
}

/// Prediction log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the newline-delimited prediction log
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Records aggregated per vendor query when the caller gives no limit
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn default_store_path() -> String {
    "predictions_store.jsonl".to_string()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing ONNX model files
    pub models_dir: String,
    /// Isolation forest file name inside `models_dir`
    #[serde(default = "default_isolation_forest")]
    pub isolation_forest: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Sigma threshold of the fallback classifier
    #[serde(default = "default_fallback_sigma")]
    pub fallback_sigma: f64,
}

fn default_isolation_forest() -> String {
    "isolation_forest.onnx".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

fn default_fallback_sigma() -> f64 {
    3.0
}

/// Historical corpus the amount statistics are computed from
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// CSV of historical procurement awards
    pub csv_path: String,
    /// Column holding the awarded amount
    #[serde(default = "default_amount_column")]
    pub amount_column: String,
}

fn default_amount_column() -> String {
    "awarded_amt".to_string()
}

/// Request processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests handled concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
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
                score_subject: "procurement.score".to_string(),
                lookup_subject: "procurement.predictions.get".to_string(),
                history_subject: "procurement.vendors.history".to_string(),
                alert_subject: "procurement.alerts".to_string(),
            },
            store: StoreConfig::default(),
            models: ModelsConfig {
                models_dir: "models".to_string(),
                isolation_forest: default_isolation_forest(),
                onnx_threads: 1,
                fallback_sigma: 3.0,
            },
            training: TrainingConfig {
                csv_path: "government-procurement-via-gebiz.csv".to_string(),
                amount_column: default_amount_column(),
            },
            pipeline: PipelineConfig {
                workers: 8,
                metrics_interval_secs: 30,
            },
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
    use tempfile::Builder;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.store.path, "predictions_store.jsonl");
        assert_eq!(config.store.history_limit, 100);
        assert_eq!(config.models.fallback_sigma, 3.0);
        assert_eq!(config.training.amount_column, "awarded_amt");
    }

    #[test]
    fn test_load_with_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
score_subject = "s"
lookup_subject = "l"
history_subject = "h"
alert_subject = "a"

[models]
models_dir = "/opt/models"

[training]
csv_path = "awards.csv"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.store.path, "predictions_store.jsonl");
        assert_eq!(config.store.history_limit, 100);
        assert_eq!(config.models.isolation_forest, "isolation_forest.onnx");
        assert_eq!(config.models.onnx_threads, 1);
        assert_eq!(config.training.amount_column, "awarded_amt");
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_checked_in_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.nats.score_subject, "procurement.score");
    }
}
