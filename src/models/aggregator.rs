//! Estimate aggregation for multi-model ensembles

use std::collections::{BTreeMap, HashMap};

/// Combines regressor outputs into a single economic loss estimate.
pub struct EstimateAggregator {
    /// Model weights for weighted average
    weights: HashMap<String, f64>,
    /// Default weight for models not in the weights map
    default_weight: f64,
}

impl EstimateAggregator {
    /// Create a new aggregator with model weights.
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self {
            weights,
            default_weight: 0.1,
        }
    }

    /// Create aggregator with equal weights for all models.
    pub fn equal_weights() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: 1.0,
        }
    }

    /// Weighted mean of the estimates; weights are normalized to sum to 1.
    ///
    /// Returns `None` when there is nothing to aggregate.
    pub fn aggregate(&self, estimates: &BTreeMap<String, f64>) -> Option<f64> {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for (model_name, &estimate) in estimates {
            let weight = self.weight(model_name);
            weighted_sum += estimate * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            Some(weighted_sum / total_weight)
        } else {
            None
        }
    }

    /// Population standard deviation of the estimates (0 for fewer than two).
    pub fn spread(estimates: &BTreeMap<String, f64>) -> f64 {
        if estimates.len() < 2 {
            return 0.0;
        }
        let n = estimates.len() as f64;
        let mean = estimates.values().sum::<f64>() / n;
        let variance = estimates.values().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    }

    /// Weight used for a model
    pub fn weight(&self, model_name: &str) -> f64 {
        self.weights
            .get(model_name)
            .copied()
            .unwrap_or(self.default_weight)
            .max(0.0)
    }
}

impl Default for EstimateAggregator {
    fn default() -> Self {
        Self::equal_weights()
    }
}
