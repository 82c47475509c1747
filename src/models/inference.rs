//! Inference engine for economic loss estimation

use crate::config::{InferenceStrategy, ModelsConfig};
use crate::error::{ContractError, EstimateError};
use crate::features::FeatureVector;
use crate::models::aggregator::EstimateAggregator;
use crate::models::loader::LoadedModel;
use crate::types::estimate::{CategoryPrediction, Estimate, LossLevel, LossLevelThresholds};
use crate::types::record::WasteRecord;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Result of model inference
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Estimated economic loss, in millions
    pub economic_loss: f64,
    /// Individual regressor outputs
    pub model_estimates: BTreeMap<String, f64>,
    /// Standard deviation across regressors (0 for a single model)
    pub spread: f64,
    /// Classifier output, when a classifier is loaded
    pub waste_category: Option<CategoryPrediction>,
}

impl Prediction {
    /// Convert the prediction into the estimate shown to the user
    pub fn to_estimate(&self, record: &WasteRecord, thresholds: &LossLevelThresholds) -> Estimate {
        let loss_level = LossLevel::from_estimate(self.economic_loss, thresholds);

        Estimate::new(
            record.clone(),
            self.economic_loss,
            loss_level,
            self.model_estimates.clone(),
        )
        .with_waste_category(self.waste_category.clone())
    }
}

/// Runs the regressors (and optional classifier) on reconciled feature vectors
pub struct InferenceEngine {
    regressors: Vec<LoadedModel>,
    classifier: Option<LoadedModel>,
    aggregator: EstimateAggregator,
    strategy: InferenceStrategy,
    primary_model: String,
}

impl InferenceEngine {
    /// Create an engine over already loaded models
    pub fn new(
        regressors: Vec<LoadedModel>,
        classifier: Option<LoadedModel>,
        config: &ModelsConfig,
    ) -> Self {
        if config.strategy == InferenceStrategy::Primary
            && !regressors.iter().any(|m| m.name == config.primary_model)
        {
            warn!(
                primary_model = %config.primary_model,
                "Primary model not loaded, predictions will use the ensemble"
            );
        }

        info!(
            strategy = ?config.strategy,
            primary_model = %config.primary_model,
            regressors = regressors.len(),
            classifier = classifier.as_ref().map(|c| c.name.as_str()).unwrap_or("none"),
            "Inference engine initialized"
        );

        Self {
            regressors,
            classifier,
            aggregator: EstimateAggregator::new(config.weights.clone()),
            strategy: config.strategy.clone(),
            primary_model: config.primary_model.clone(),
        }
    }

    /// Get the current inference strategy
    pub fn strategy(&self) -> &InferenceStrategy {
        &self.strategy
    }

    /// Get the number of loaded regressors
    pub fn model_count(&self) -> usize {
        self.regressors.len()
    }

    /// Get loaded model names, classifier last
    pub fn model_names(&self) -> Vec<String> {
        self.regressors
            .iter()
            .chain(self.classifier.iter())
            .map(|m| m.name.clone())
            .collect()
    }

    /// Run inference on a reconciled feature vector using the configured strategy
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, EstimateError> {
        self.predict_values(features.as_slice())
    }

    /// Run inference on raw feature values in contract order
    pub fn predict_values(&self, x: &[f64]) -> Result<Prediction, EstimateError> {
        let mut prediction = match self.strategy {
            InferenceStrategy::Primary => self.predict_primary(x)?,
            InferenceStrategy::Ensemble => self.predict_ensemble(x)?,
        };

        if let Some(classifier) = &self.classifier {
            prediction.waste_category = Some(self.classify(classifier, x)?);
        }

        Ok(prediction)
    }

    /// Run only the primary regressor
    fn predict_primary(&self, x: &[f64]) -> Result<Prediction, EstimateError> {
        let Some(model) = self.regressors.iter().find(|m| m.name == self.primary_model) else {
            warn!(
                primary_model = %self.primary_model,
                "Primary model not found, falling back to ensemble"
            );
            return self.predict_ensemble(x);
        };

        let estimate = match self.run_regressor(model, x) {
            Ok(estimate) => estimate,
            Err(e @ EstimateError::Contract(_)) => return Err(e),
            Err(e) if self.regressors.len() > 1 => {
                error!(
                    model = %model.name,
                    error = %e,
                    "Primary model inference failed, falling back to ensemble"
                );
                return self.predict_ensemble(x);
            }
            Err(e) => return Err(e),
        };

        let mut model_estimates = BTreeMap::new();
        model_estimates.insert(model.name.clone(), estimate);

        debug!(
            strategy = "primary",
            model = %model.name,
            economic_loss = estimate,
            "Primary model inference complete"
        );

        Ok(Prediction {
            economic_loss: estimate,
            model_estimates,
            spread: 0.0,
            waste_category: None,
        })
    }

    /// Run every regressor and combine with the weighted mean
    fn predict_ensemble(&self, x: &[f64]) -> Result<Prediction, EstimateError> {
        let mut model_estimates = BTreeMap::new();
        let mut last_failure = None;

        for model in &self.regressors {
            match self.run_regressor(model, x) {
                Ok(estimate) => {
                    model_estimates.insert(model.name.clone(), estimate);
                }
                Err(e @ EstimateError::Contract(_)) => return Err(e),
                Err(e) => {
                    error!(model = %model.name, error = %e, "Model inference failed");
                    last_failure = Some(e);
                }
            }
        }

        let Some(economic_loss) = self.aggregator.aggregate(&model_estimates) else {
            return Err(last_failure.unwrap_or_else(|| EstimateError::Model {
                model: "ensemble".to_string(),
                message: "no regressor produced an estimate".to_string(),
            }));
        };

        let spread = EstimateAggregator::spread(&model_estimates);

        debug!(
            strategy = "ensemble",
            economic_loss = economic_loss,
            spread = spread,
            model_estimates = ?model_estimates,
            "Ensemble inference complete"
        );

        Ok(Prediction {
            economic_loss,
            model_estimates,
            spread,
            waste_category: None,
        })
    }

    /// Run a single regressor after checking the input width
    fn run_regressor(&self, model: &LoadedModel, x: &[f64]) -> Result<f64, EstimateError> {
        check_input(model, x)?;

        let estimate = model.predict_value(x).map_err(|e| EstimateError::Model {
            model: model.name.clone(),
            message: e.to_string(),
        })?;

        if !estimate.is_finite() {
            return Err(EstimateError::Model {
                model: model.name.clone(),
                message: format!("non-finite output {}", estimate),
            });
        }
        Ok(estimate)
    }

    fn classify(&self, model: &LoadedModel, x: &[f64]) -> Result<CategoryPrediction, EstimateError> {
        check_input(model, x)?;

        let proba = model.predict_proba(x).map_err(|e| EstimateError::Model {
            model: model.name.clone(),
            message: e.to_string(),
        })?;

        let (best, &confidence) = proba
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| EstimateError::Model {
                model: model.name.clone(),
                message: "no class probabilities".to_string(),
            })?;

        let probabilities = model
            .classes()
            .iter()
            .cloned()
            .zip(proba.iter().copied())
            .collect();

        Ok(CategoryPrediction {
            label: model.classes()[best].clone(),
            confidence,
            probabilities,
        })
    }
}

/// A model is only invoked on vectors of the width it was fitted on
fn check_input(model: &LoadedModel, x: &[f64]) -> Result<(), ContractError> {
    if x.len() != model.n_features() {
        return Err(ContractError::FeatureCountMismatch {
            stage: format!("model '{}'", model.name),
            expected: model.n_features(),
            actual: x.len(),
        });
    }
    Ok(())
}
