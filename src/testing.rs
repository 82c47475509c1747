//! In-memory artifacts shared by unit tests

use crate::config::UnknownCategoryPolicy;
use crate::features::{CategoricalEncoder, EncoderSet, FeatureContract, FeatureExtractor, Scaler};
use crate::models::linear::{LinearRegressor, LogisticClassifier};
use crate::models::loader::{LoadedModel, ModelArtifact};
use crate::models::tree::{DecisionTree, TreeAggregation, TreeEnsembleRegressor};
use crate::types::record::WasteRecord;
use std::collections::BTreeMap;

pub const NUMERIC: [&str; 5] = [
    "Year",
    "Total Waste (Tons)",
    "Avg Waste per Capita (Kg)",
    "Population (Million)",
    "Household Waste (%)",
];

pub const COUNTRIES: [&str; 6] = ["France", "USA", "China", "India", "Brazil", "Japan"];

pub const CATEGORIES: [&str; 4] = [
    "Fruits & Vegetables",
    "Prepared Food",
    "Dairy Products",
    "Meat & Seafood",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn contract() -> FeatureContract {
    let mut features = strings(&NUMERIC);
    features.extend(COUNTRIES.iter().map(|c| format!("Country_{}", c)));
    features.extend(CATEGORIES.iter().map(|c| format!("Food Category_{}", c)));
    FeatureContract::new(features).unwrap()
}

pub fn scaler() -> Scaler {
    Scaler::Standard {
        feature_names: strings(&NUMERIC),
        mean: vec![2021.0, 25_000.0, 110.0, 700.0, 50.0],
        scale: vec![2.0, 14_000.0, 50.0, 400.0, 15.0],
    }
}

pub fn encoders() -> EncoderSet {
    let mut encoders = BTreeMap::new();
    encoders.insert(
        "Country".to_string(),
        CategoricalEncoder::OneHot {
            categories: strings(&COUNTRIES),
        },
    );
    encoders.insert(
        "Food Category".to_string(),
        CategoricalEncoder::OneHot {
            categories: strings(&CATEGORIES),
        },
    );
    EncoderSet::new(encoders).unwrap()
}

pub fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(contract(), encoders(), scaler(), UnknownCategoryPolicy::Error).unwrap()
}

/// France, 2022, dairy, with the form's default numbers
pub fn record() -> WasteRecord {
    WasteRecord::new("France", 2022, "Dairy Products", 10_000.0, 50.0, 50.0, 30.0)
}

fn with_total_waste(weight: f64) -> Vec<f64> {
    let mut row = vec![0.0; 15];
    row[1] = weight;
    row
}

/// Root splits scaled total waste at `threshold`
fn stump(threshold: f64, left: f64, right: f64) -> DecisionTree {
    DecisionTree {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![1, -2, -2],
        threshold: vec![threshold, -2.0, -2.0],
        value: vec![vec![0.0], vec![left], vec![right]],
    }
}

pub fn regressors() -> Vec<LoadedModel> {
    let mut coefficients = with_total_waste(17_000.0);
    coefficients[0] = 100.0;
    coefficients[2] = 800.0;
    coefficients[3] = 1_200.0;
    coefficients[4] = 300.0;

    let lasso = LoadedModel::from_artifact(
        "lasso",
        ModelArtifact::Linear(LinearRegressor {
            feature_names: Some(contract().features),
            coefficients,
            intercept: 25_000.0,
        }),
    )
    .unwrap();

    let forest = LoadedModel::from_artifact(
        "random_forest",
        ModelArtifact::TreeEnsembleRegressor(TreeEnsembleRegressor {
            feature_names: None,
            n_features: 15,
            trees: vec![stump(0.0, 12_000.0, 40_000.0), stump(-0.5, 8_000.0, 30_000.0)],
            aggregation: TreeAggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
        }),
    )
    .unwrap();

    vec![lasso, forest]
}

/// Linear model whose output overflows to infinity for a French record
pub fn overflowing_regressor(name: &str) -> LoadedModel {
    let mut coefficients = vec![0.0; 15];
    coefficients[5] = f64::MAX;

    LoadedModel::from_artifact(
        name,
        ModelArtifact::Linear(LinearRegressor {
            feature_names: None,
            coefficients,
            intercept: f64::MAX,
        }),
    )
    .unwrap()
}

pub fn classifier() -> LoadedModel {
    LoadedModel::from_artifact(
        "waste_level",
        ModelArtifact::Logistic(LogisticClassifier {
            feature_names: None,
            classes: strings(&["Low", "Medium", "High"]),
            coefficients: vec![
                with_total_waste(-2.0),
                with_total_waste(0.0),
                with_total_waste(2.0),
            ],
            intercepts: vec![0.0, 0.5, 0.0],
        }),
    )
    .unwrap()
}
