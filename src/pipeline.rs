//! End-to-end estimation: validate → reconcile features → predict → estimate

use crate::config::{AppConfig, DisplayConfig};
use crate::error::{ContractError, EstimateError};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::form::FormSchema;
use crate::models::{ArtifactBundle, InferenceEngine};
use crate::types::estimate::Estimate;
use crate::types::record::WasteRecord;
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything needed to answer one form submission. Built once per process.
pub struct Estimator {
    schema: FormSchema,
    extractor: FeatureExtractor,
    engine: InferenceEngine,
    display: DisplayConfig,
}

impl Estimator {
    /// Fails when the form offers inputs the fitted artifacts cannot encode
    pub fn new(
        schema: FormSchema,
        extractor: FeatureExtractor,
        engine: InferenceEngine,
        display: DisplayConfig,
    ) -> Result<Self, ContractError> {
        schema.check_extractor(&extractor)?;
        Ok(Self {
            schema,
            extractor,
            engine,
            display,
        })
    }

    /// Load every artifact named in the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let schema = FormSchema::new(config.form.clone()).context("Invalid form configuration")?;
        let bundle = ArtifactBundle::load(config)?;
        let engine = InferenceEngine::new(bundle.regressors, bundle.classifier, &config.models);

        let estimator = Self::new(schema, bundle.extractor, engine, config.display.clone())
            .context("Form options do not match the fitted artifacts")?;

        info!(
            features = estimator.extractor.feature_count(),
            models = ?estimator.engine.model_names(),
            "Estimator ready"
        );
        Ok(estimator)
    }

    /// Estimate the economic loss for a record
    pub fn estimate(&self, record: &WasteRecord) -> Result<Estimate, EstimateError> {
        self.schema.validate(record)?;
        let features = self.features(record)?;
        let prediction = self.engine.predict(&features)?;

        let estimate = prediction.to_estimate(record, &self.display.loss_levels);

        debug!(
            record_id = %record.record_id,
            economic_loss = estimate.economic_loss_million,
            loss_level = ?estimate.loss_level,
            spread = prediction.spread,
            "Estimate produced"
        );

        Ok(estimate)
    }

    /// Parse urlencoded form values, then estimate
    pub fn estimate_form(
        &self,
        form: &HashMap<String, String>,
    ) -> Result<(WasteRecord, Estimate), EstimateError> {
        let record = self.schema.parse(form)?;
        let estimate = self.estimate(&record)?;
        Ok((record, estimate))
    }

    /// The reconciled model input for a record
    pub fn features(&self, record: &WasteRecord) -> Result<FeatureVector, EstimateError> {
        Ok(self.extractor.extract(record)?)
    }

    /// Format an estimate for display, e.g. `$1234.56 million`
    pub fn format_amount(&self, estimate: &Estimate) -> String {
        self.display.format.amount(estimate.economic_loss_million)
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }
}
