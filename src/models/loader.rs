//! Artifact loading: feature contract, encoders, scaler and models

use crate::config::{AppConfig, ModelEntry};
use crate::error::ContractError;
use crate::features::{EncoderSet, FeatureContract, FeatureExtractor, Scaler};
use crate::models::linear::{LinearRegressor, LogisticClassifier};
use crate::models::tree::{TreeEnsembleClassifier, TreeEnsembleRegressor};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[cfg(feature = "onnx")]
use crate::models::onnx::OnnxModel;

/// What a model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    Regression,
    Classification,
}

/// JSON model artifact, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearRegressor),
    TreeEnsembleRegressor(TreeEnsembleRegressor),
    Logistic(LogisticClassifier),
    TreeEnsembleClassifier(TreeEnsembleClassifier),
}

impl ModelArtifact {
    pub fn validate(&self, name: &str) -> Result<(), ContractError> {
        match self {
            ModelArtifact::Linear(m) => m.validate(name),
            ModelArtifact::TreeEnsembleRegressor(m) => m.validate(name),
            ModelArtifact::Logistic(m) => m.validate(name),
            ModelArtifact::TreeEnsembleClassifier(m) => m.validate(name),
        }
    }
}

/// Backend that evaluates a loaded model
pub enum ModelBackend {
    Json(ModelArtifact),
    #[cfg(feature = "onnx")]
    Onnx {
        model: OnnxModel,
        classes: Vec<String>,
    },
}

/// Loaded model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    n_features: usize,
    backend: ModelBackend,
}

impl LoadedModel {
    /// Wrap a validated JSON artifact
    pub fn from_artifact(name: &str, artifact: ModelArtifact) -> Result<Self, ContractError> {
        artifact.validate(name)?;
        let n_features = match &artifact {
            ModelArtifact::Linear(m) => m.n_features(),
            ModelArtifact::TreeEnsembleRegressor(m) => m.n_features,
            ModelArtifact::Logistic(m) => m.n_features(),
            ModelArtifact::TreeEnsembleClassifier(m) => m.n_features,
        };
        Ok(Self {
            name: name.to_string(),
            n_features,
            backend: ModelBackend::Json(artifact),
        })
    }

    pub fn task(&self) -> ModelTask {
        match &self.backend {
            ModelBackend::Json(ModelArtifact::Linear(_))
            | ModelBackend::Json(ModelArtifact::TreeEnsembleRegressor(_)) => ModelTask::Regression,
            ModelBackend::Json(ModelArtifact::Logistic(_))
            | ModelBackend::Json(ModelArtifact::TreeEnsembleClassifier(_)) => {
                ModelTask::Classification
            }
            #[cfg(feature = "onnx")]
            ModelBackend::Onnx { classes, .. } => {
                if classes.is_empty() {
                    ModelTask::Regression
                } else {
                    ModelTask::Classification
                }
            }
        }
    }

    /// Number of input features the model was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Feature names recorded in the artifact, if any
    pub fn feature_names(&self) -> Option<&[String]> {
        match &self.backend {
            ModelBackend::Json(ModelArtifact::Linear(m)) => m.feature_names.as_deref(),
            ModelBackend::Json(ModelArtifact::TreeEnsembleRegressor(m)) => {
                m.feature_names.as_deref()
            }
            ModelBackend::Json(ModelArtifact::Logistic(m)) => m.feature_names.as_deref(),
            ModelBackend::Json(ModelArtifact::TreeEnsembleClassifier(m)) => {
                m.feature_names.as_deref()
            }
            #[cfg(feature = "onnx")]
            ModelBackend::Onnx { .. } => None,
        }
    }

    /// Class labels of a classifier, empty for regressors
    pub fn classes(&self) -> &[String] {
        match &self.backend {
            ModelBackend::Json(ModelArtifact::Logistic(m)) => &m.classes,
            ModelBackend::Json(ModelArtifact::TreeEnsembleClassifier(m)) => &m.classes,
            ModelBackend::Json(_) => &[],
            #[cfg(feature = "onnx")]
            ModelBackend::Onnx { classes, .. } => classes,
        }
    }

    /// Regression output for one row. Callers check the row length first.
    pub fn predict_value(&self, x: &[f64]) -> Result<f64> {
        match &self.backend {
            ModelBackend::Json(ModelArtifact::Linear(m)) => Ok(m.predict(x)),
            ModelBackend::Json(ModelArtifact::TreeEnsembleRegressor(m)) => Ok(m.predict(x)),
            ModelBackend::Json(_) => anyhow::bail!("'{}' is not a regressor", self.name),
            #[cfg(feature = "onnx")]
            ModelBackend::Onnx { model, .. } => model
                .run(x)?
                .first()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("Empty regression output")),
        }
    }

    /// Class probabilities for one row, in `classes()` order
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        match &self.backend {
            ModelBackend::Json(ModelArtifact::Logistic(m)) => Ok(m.predict_proba(x)),
            ModelBackend::Json(ModelArtifact::TreeEnsembleClassifier(m)) => Ok(m.predict_proba(x)),
            ModelBackend::Json(_) => anyhow::bail!("'{}' is not a classifier", self.name),
            #[cfg(feature = "onnx")]
            ModelBackend::Onnx { model, classes } => {
                let proba = model.run(x)?;
                if proba.len() != classes.len() {
                    anyhow::bail!(
                        "Expected {} class probabilities, got {}",
                        classes.len(),
                        proba.len()
                    );
                }
                Ok(proba)
            }
        }
    }
}

/// Loader for model artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self { onnx_threads }
    }

    /// Load a single model; the backend is chosen by file extension.
    ///
    /// `expected_features` is used for ONNX models whose input width is dynamic.
    pub fn load_model<P: AsRef<Path>>(
        &self,
        path: P,
        entry: &ModelEntry,
        expected_features: usize,
    ) -> Result<LoadedModel> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        info!(model = %entry.name, path = %path.display(), "Loading model");

        match extension {
            "json" => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read model from {:?}", path))?;
                let artifact: ModelArtifact = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse model {:?}", path))?;
                let model = LoadedModel::from_artifact(&entry.name, artifact)?;
                info!(
                    model = %entry.name,
                    task = ?model.task(),
                    n_features = model.n_features(),
                    "Model loaded successfully"
                );
                Ok(model)
            }
            "onnx" => self.load_onnx(path, entry, expected_features),
            other => anyhow::bail!("Unsupported model format '{}' for {:?}", other, path),
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(
        &self,
        path: &Path,
        entry: &ModelEntry,
        expected_features: usize,
    ) -> Result<LoadedModel> {
        let model = OnnxModel::load(path, &entry.name, self.onnx_threads)?;
        let n_features = model.n_features().unwrap_or(expected_features);
        Ok(LoadedModel {
            name: entry.name.clone(),
            n_features,
            backend: ModelBackend::Onnx {
                model,
                classes: entry.classes.clone(),
            },
        })
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(
        &self,
        path: &Path,
        entry: &ModelEntry,
        _expected_features: usize,
    ) -> Result<LoadedModel> {
        anyhow::bail!(
            "Model '{}' at {:?} needs the `onnx` feature (threads: {})",
            entry.name,
            path,
            self.onnx_threads
        )
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Every artifact needed to turn a record into an estimate, loaded once
pub struct ArtifactBundle {
    pub extractor: FeatureExtractor,
    pub regressors: Vec<LoadedModel>,
    pub classifier: Option<LoadedModel>,
}

impl ArtifactBundle {
    /// Load all artifacts named in the configuration
    pub fn load(config: &AppConfig) -> Result<Self> {
        let artifacts = &config.artifacts;

        let contract = FeatureContract::from_json(&read(&artifacts.path(&artifacts.contract))?)?;
        let scaler = Scaler::from_json(&read(&artifacts.path(&artifacts.scaler))?)?;
        let encoders = EncoderSet::from_json(&read(&artifacts.path(&artifacts.encoders))?)?;

        info!(
            features = contract.len(),
            scaler = scaler.kind(),
            scaled_columns = scaler.n_features(),
            encoders = encoders.len(),
            "Feature pipeline artifacts loaded"
        );

        let extractor = FeatureExtractor::new(
            contract,
            encoders,
            scaler,
            config.encoding.unknown_category,
        )
        .context("Encoders and scaler disagree with the feature contract")?;

        let loader = ModelLoader::with_threads(config.models.onnx_threads);
        let expected = extractor.feature_count();

        let regressors = config
            .models
            .regressors
            .iter()
            .map(|entry| loader.load_model(artifacts.path(&entry.file), entry, expected))
            .collect::<Result<Vec<_>>>()?;

        let classifier = config
            .models
            .classifier
            .as_ref()
            .map(|entry| loader.load_model(artifacts.path(&entry.file), entry, expected))
            .transpose()?;

        Ok(Self::from_parts(extractor, regressors, classifier)?)
    }

    /// Assemble a bundle, checking each model against the feature contract
    pub fn from_parts(
        extractor: FeatureExtractor,
        regressors: Vec<LoadedModel>,
        classifier: Option<LoadedModel>,
    ) -> Result<Self, ContractError> {
        if regressors.is_empty() {
            return Err(ContractError::invalid_artifact("models", "no regressors"));
        }

        for model in &regressors {
            if model.task() != ModelTask::Regression {
                return Err(ContractError::invalid_artifact(
                    &model.name,
                    "configured as a regressor but is a classifier",
                ));
            }
            extractor.contract().check_model_features(
                &model.name,
                model.n_features(),
                model.feature_names(),
            )?;
        }

        if let Some(model) = &classifier {
            if model.task() != ModelTask::Classification {
                return Err(ContractError::invalid_artifact(
                    &model.name,
                    "configured as a classifier but is a regressor",
                ));
            }
            extractor.contract().check_model_features(
                &model.name,
                model.n_features(),
                model.feature_names(),
            )?;
        }

        Ok(Self {
            extractor,
            regressors,
            classifier,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read artifact {:?}", path))
}
