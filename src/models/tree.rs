//! Decision tree ensembles stored as flat node arrays.
//!
//! Nodes follow the fitted-tree layout: node 0 is the root, a node is a leaf
//! when `children_left[node] == -1`, and samples go left when
//! `x[feature[node]] <= threshold[node]`. `value[node]` holds the leaf output
//! (one value for regression, one count or probability per class for
//! classification).

use crate::error::ContractError;
use crate::models::linear::check_names;
use serde::{Deserialize, Serialize};

const LEAF: i64 = -1;

/// A single fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    /// Check node arrays are consistent, children point forward and leaves have `n_outputs` values.
    pub fn validate(&self, n_features: usize, n_outputs: usize) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("node arrays have different lengths".to_string());
        }

        for node in 0..n {
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == LEAF {
                if self.value[node].len() != n_outputs {
                    return Err(format!(
                        "leaf {} has {} values, expected {}",
                        node,
                        self.value[node].len(),
                        n_outputs
                    ));
                }
                continue;
            }
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {} has invalid child {}", node, child));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", node, feature));
            }
        }
        Ok(())
    }

    /// Leaf values reached by `x`
    pub fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == LEAF {
                return &self.value[node];
            }
            let feature = self.feature[node] as usize;
            node = if x[feature] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

/// How tree outputs are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeAggregation {
    /// Random forest: average of tree outputs
    #[default]
    Mean,
    /// Gradient boosting: sum of tree outputs
    Sum,
}

fn default_learning_rate() -> f64 {
    1.0
}

/// Regression ensemble: `base_score + learning_rate * aggregate(trees)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleRegressor {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
    #[serde(default)]
    pub aggregation: TreeAggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl TreeEnsembleRegressor {
    pub fn validate(&self, name: &str) -> Result<(), ContractError> {
        validate_trees(name, &self.trees, self.n_features, 1)?;
        check_names(name, self.feature_names.as_deref(), self.n_features)
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.leaf(x)[0]).sum();
        let combined = match self.aggregation {
            TreeAggregation::Mean => total / self.trees.len() as f64,
            TreeAggregation::Sum => total,
        };
        self.base_score + self.learning_rate * combined
    }
}

/// Classification ensemble averaging per-tree class distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleClassifier {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub n_features: usize,
    pub classes: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsembleClassifier {
    pub fn validate(&self, name: &str) -> Result<(), ContractError> {
        if self.classes.len() < 2 {
            return Err(ContractError::invalid_artifact(name, "fewer than two classes"));
        }
        validate_trees(name, &self.trees, self.n_features, self.classes.len())?;
        check_names(name, self.feature_names.as_deref(), self.n_features)
    }

    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(x);
            let total: f64 = leaf.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (p, v) in proba.iter_mut().zip(leaf) {
                *p += v / total;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

fn validate_trees(
    name: &str,
    trees: &[DecisionTree],
    n_features: usize,
    n_outputs: usize,
) -> Result<(), ContractError> {
    if trees.is_empty() {
        return Err(ContractError::invalid_artifact(name, "ensemble has no trees"));
    }
    for (i, tree) in trees.iter().enumerate() {
        tree.validate(n_features, n_outputs)
            .map_err(|reason| ContractError::invalid_artifact(name, format!("tree {}: {}", i, reason)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root splits feature 0 at `threshold`; leaves carry `left` and `right`
    fn stump(threshold: f64, left: Vec<f64>, right: Vec<f64>) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![0.0; left.len()], left, right],
        }
    }

    #[test]
    fn test_forest_mean() {
        let forest = TreeEnsembleRegressor {
            feature_names: None,
            n_features: 1,
            trees: vec![stump(0.0, vec![10.0], vec![40.0]), stump(-0.5, vec![20.0], vec![30.0])],
            aggregation: TreeAggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
        };
        forest.validate("rf").unwrap();

        assert_eq!(forest.predict(&[-1.0]), 15.0);
        assert_eq!(forest.predict(&[-0.25]), 20.0);
        assert_eq!(forest.predict(&[1.0]), 35.0);
    }

    #[test]
    fn test_boosting_sum() {
        let boosted = TreeEnsembleRegressor {
            feature_names: None,
            n_features: 1,
            trees: vec![stump(0.0, vec![-1.0], vec![1.0]), stump(0.0, vec![-1.0], vec![1.0])],
            aggregation: TreeAggregation::Sum,
            base_score: 100.0,
            learning_rate: 0.5,
        };
        assert_eq!(boosted.predict(&[2.0]), 101.0);
    }

    #[test]
    fn test_classifier_averages_distributions() {
        let clf = TreeEnsembleClassifier {
            feature_names: None,
            n_features: 1,
            classes: vec!["Low".into(), "High".into()],
            trees: vec![
                stump(0.0, vec![9.0, 1.0], vec![1.0, 3.0]),
                stump(0.0, vec![1.0, 0.0], vec![0.0, 1.0]),
            ],
        };
        clf.validate("clf").unwrap();

        let proba = clf.predict_proba(&[-1.0]);
        assert!((proba[0] - 0.95).abs() < 1e-12);
        assert!((proba[1] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_backward_child_rejected() {
        let mut tree = stump(0.0, vec![1.0], vec![2.0]);
        tree.children_right[0] = 0;
        assert!(tree.validate(1, 1).is_err());
    }

    #[test]
    fn test_unknown_split_feature_rejected() {
        let mut tree = stump(0.0, vec![1.0], vec![2.0]);
        tree.feature[0] = 3;
        let err = tree.validate(2, 1).unwrap_err();
        assert!(err.contains("unknown feature 3"));
    }
}
