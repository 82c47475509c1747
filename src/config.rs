//! Configuration management for the estimator

use crate::types::estimate::{DisplayFormat, LossLevelThresholds};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How regressors are combined into one estimate
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    /// Use the primary regressor only
    #[default]
    Primary,
    /// Weighted mean over every loaded regressor
    Ensemble,
}

/// What to do with a categorical value the encoder was not fitted on
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategoryPolicy {
    /// Reject the input with a validation error
    #[default]
    Error,
    /// Map to -1 (label) or an all-zero row (one-hot) and log a warning
    Sentinel,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
}

/// Locations of the fitted artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory containing every artifact file
    pub dir: String,
    #[serde(default = "default_contract_file")]
    pub contract: String,
    #[serde(default = "default_scaler_file")]
    pub scaler: String,
    #[serde(default = "default_encoders_file")]
    pub encoders: String,
}

fn default_contract_file() -> String {
    "contract.json".to_string()
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

impl ArtifactsConfig {
    pub fn path(&self, file: &str) -> PathBuf {
        Path::new(&self.dir).join(file)
    }
}

/// A model artifact entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Name used in logs, weights and results
    pub name: String,
    /// File name relative to the artifacts directory (`.json` or `.onnx`)
    pub file: String,
    /// Class labels for ONNX classifiers, which do not carry them
    #[serde(default)]
    pub classes: Vec<String>,
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// "primary" (single regressor) or "ensemble" (all regressors)
    #[serde(default)]
    pub strategy: InferenceStrategy,
    /// Regressor used by the primary strategy
    pub primary_model: String,
    /// Regressors producing the economic loss estimate
    pub regressors: Vec<ModelEntry>,
    /// Optional waste-level classifier
    #[serde(default)]
    pub classifier: Option<ModelEntry>,
    /// Regressor weights for the ensemble strategy
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Threads per ONNX session
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Categorical encoding behaviour
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncodingConfig {
    #[serde(default)]
    pub unknown_category: UnknownCategoryPolicy,
}

/// Bounds and default of a numeric form field
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NumericField {
    pub min: f64,
    /// Upper bound; unbounded when absent
    #[serde(default)]
    pub max: Option<f64>,
    pub default: f64,
}

/// Form options, ranges and defaults
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    pub countries: Vec<String>,
    pub food_categories: Vec<String>,
    pub year_min: i32,
    pub year_max: i32,
    pub year_default: i32,
    pub total_waste_tons: NumericField,
    pub avg_waste_per_capita_kg: NumericField,
    pub population_million: NumericField,
    pub household_waste_pct: NumericField,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            countries: ["France", "USA", "China", "India", "Brazil", "Japan"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            food_categories: [
                "Fruits & Vegetables",
                "Prepared Food",
                "Dairy Products",
                "Meat & Seafood",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            year_min: 2018,
            year_max: 2025,
            year_default: 2022,
            total_waste_tons: NumericField {
                min: 0.0,
                max: None,
                default: 10_000.0,
            },
            avg_waste_per_capita_kg: NumericField {
                min: 0.0,
                max: None,
                default: 50.0,
            },
            population_million: NumericField {
                min: 0.0,
                max: None,
                default: 50.0,
            },
            household_waste_pct: NumericField {
                min: 0.0,
                max: Some(100.0),
                default: 30.0,
            },
        }
    }
}

/// Result presentation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub format: DisplayFormat,
    #[serde(default)]
    pub loss_levels: LossLevelThresholds,
}

/// Periodic metrics reporting
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summaries in the log; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
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

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `FWE__` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FWE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert("lasso".to_string(), 0.6);
        weights.insert("random_forest".to_string(), 0.4);

        Self {
            server: ServerConfig {
                bind: "127.0.0.1:8080".to_string(),
            },
            artifacts: ArtifactsConfig {
                dir: "artifacts".to_string(),
                contract: default_contract_file(),
                scaler: default_scaler_file(),
                encoders: default_encoders_file(),
            },
            models: ModelsConfig {
                strategy: InferenceStrategy::Primary,
                primary_model: "lasso".to_string(),
                regressors: vec![
                    ModelEntry {
                        name: "lasso".to_string(),
                        file: "lasso_model.json".to_string(),
                        classes: Vec::new(),
                    },
                    ModelEntry {
                        name: "random_forest".to_string(),
                        file: "random_forest.json".to_string(),
                        classes: Vec::new(),
                    },
                ],
                classifier: Some(ModelEntry {
                    name: "waste_level".to_string(),
                    file: "waste_level_classifier.json".to_string(),
                    classes: Vec::new(),
                }),
                weights,
                onnx_threads: 1,
            },
            encoding: EncodingConfig::default(),
            form: FormConfig::default(),
            display: DisplayConfig::default(),
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
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.models.strategy, InferenceStrategy::Primary);
        assert_eq!(config.models.primary_model, "lasso");
        assert_eq!(config.models.regressors.len(), 2);
        assert_eq!(config.encoding.unknown_category, UnknownCategoryPolicy::Error);
        assert_eq!(config.form.year_default, 2022);
        assert_eq!(config.form.household_waste_pct.max, Some(100.0));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[server]
bind = "0.0.0.0:9000"

[artifacts]
dir = "/srv/artifacts"

[models]
strategy = "ensemble"
primary_model = "lasso"
regressors = [{{ name = "lasso", file = "lasso_model.json" }}]

[encoding]
unknown_category = "sentinel"

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.models.strategy, InferenceStrategy::Ensemble);
        assert!(config.models.classifier.is_none());
        assert_eq!(config.artifacts.scaler, "scaler.json");
        assert_eq!(
            config.artifacts.path("scaler.json"),
            PathBuf::from("/srv/artifacts/scaler.json")
        );
        assert_eq!(config.encoding.unknown_category, UnknownCategoryPolicy::Sentinel);
        // Sections left out fall back to the original form values
        assert_eq!(config.form.countries.len(), 6);
        assert_eq!(config.display.format.currency_symbol, "$");
    }
}
