//! End-to-end tests against the shipped configuration and artifacts

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use food_waste_estimator::{
    config::{AppConfig, InferenceStrategy},
    error::ErrorResponse,
    metrics::ServiceMetrics,
    server::{create_router, AppState, HealthResponse},
    types::estimate::Estimate,
    Estimator, WasteRecord,
};
use std::sync::Arc;
use tower::util::ServiceExt;

fn shipped_config() -> AppConfig {
    let root = env!("CARGO_MANIFEST_DIR");
    let mut config = AppConfig::load_from_path(format!("{}/config/config.toml", root)).unwrap();
    config.artifacts.dir = format!("{}/artifacts", root);
    config
}

fn create_app(config: &AppConfig) -> Router {
    let estimator = Estimator::from_config(config).unwrap();
    let state = AppState::new(estimator, Arc::new(ServiceMetrics::new())).unwrap();
    create_router(state)
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_record() -> serde_json::Value {
    serde_json::json!({
        "record_id": "rec-1",
        "country": "Japan",
        "year": 2023,
        "food_category": "Meat & Seafood",
        "total_waste_tons": 26000.0,
        "avg_waste_per_capita_kg": 95.5,
        "population_million": 125.7,
        "household_waste_pct": 44.0
    })
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = shipped_config();
    let defaults = AppConfig::default();

    assert_eq!(config.server.bind, defaults.server.bind);
    assert_eq!(config.models.strategy, defaults.models.strategy);
    assert_eq!(config.models.regressors.len(), defaults.models.regressors.len());
    assert_eq!(config.form.countries, defaults.form.countries);
    assert_eq!(config.form.household_waste_pct, defaults.form.household_waste_pct);
    assert_eq!(config.models.weights, defaults.models.weights);
}

#[tokio::test]
async fn test_estimate_with_shipped_artifacts() {
    let app = create_app(&shipped_config());

    let response = app
        .oneshot(json_request("/api/estimate", valid_record()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let estimate: Estimate = serde_json::from_slice(&body).unwrap();
    assert_eq!(estimate.record_id, "rec-1");
    assert!(estimate.economic_loss_million.is_finite());
    assert_eq!(estimate.model_estimates.len(), 1);
    assert!(estimate.model_estimates.contains_key("lasso"));
    assert!(estimate.waste_category.is_some());
}

#[tokio::test]
async fn test_ensemble_reports_every_regressor() {
    let mut config = shipped_config();
    config.models.strategy = InferenceStrategy::Ensemble;
    let app = create_app(&config);

    let response = app
        .oneshot(json_request("/api/estimate", valid_record()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let estimate: Estimate = serde_json::from_slice(&body).unwrap();
    assert_eq!(estimate.model_estimates.len(), 2);
}

#[tokio::test]
async fn test_unknown_food_category_is_rejected() {
    let app = create_app(&shipped_config());
    let mut record = valid_record();
    record["food_category"] = serde_json::json!("Bakery Items");

    let response = app
        .oneshot(json_request("/api/estimate", record))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.kind, "unknown_category");
    assert_eq!(error.field.as_deref(), Some("Food Category"));
}

#[tokio::test]
async fn test_dataset_column_names_are_accepted() {
    let app = create_app(&shipped_config());
    let record = serde_json::json!({
        "Country": "India",
        "Year": 2019,
        "Food Category": "Prepared Food",
        "Total Waste (Tons)": 31000.0,
        "Avg Waste per Capita (Kg)": 120.0,
        "Population (Million)": 1380.0,
        "Household Waste (%)": 55.0
    });

    let response = app
        .oneshot(json_request("/api/estimate", record))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_schema_lists_contract() {
    let app = create_app(&shipped_config());

    let response = app
        .oneshot(Request::builder().uri("/api/schema").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let schema: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let features = schema["contract"]["features"].as_array().unwrap();
    assert_eq!(features.len(), 15);
    assert_eq!(features[0], "Year");
    assert_eq!(schema["fields"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_health_lists_models() {
    let app = create_app(&shipped_config());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.models, vec!["lasso", "random_forest", "waste_level"]);
}

#[test]
fn test_same_record_same_estimate() {
    let estimator = Estimator::from_config(&shipped_config()).unwrap();
    let record: WasteRecord = serde_json::from_value(valid_record()).unwrap();

    let a = estimator.estimate(&record).unwrap();
    let b = estimator.estimate(&record).unwrap();

    assert_eq!(a.economic_loss_million, b.economic_loss_million);
    assert_eq!(a.waste_category, b.waste_category);
}
