//! HTTP front end: the estimation page and a small JSON API

use crate::error::{ErrorResponse, EstimateError};
use crate::features::FeatureContract;
use crate::form::FieldSpec;
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::pipeline::Estimator;
use crate::render::{PageRenderer, PageView};
use crate::types::estimate::Estimate;
use crate::types::record::WasteRecord;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<Estimator>,
    pub renderer: Arc<PageRenderer>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(estimator: Estimator, metrics: Arc<ServiceMetrics>) -> anyhow::Result<Self> {
        Ok(Self {
            estimator: Arc::new(estimator),
            renderer: Arc::new(PageRenderer::new()?),
            metrics,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models: Vec<String>,
}

/// Inputs and features the service expects
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub contract: FeatureContract,
    pub fields: Vec<FieldSpec>,
    pub scaler: &'static str,
    pub encoded_columns: Vec<String>,
    pub models: Vec<String>,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_handler))
        .route("/api/estimate", post(estimate_handler))
        .route("/api/schema", get(schema_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Bind and serve until interrupted
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let metrics = state.metrics.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    metrics.print_summary();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Run one estimate and record its outcome
fn run_estimate(
    state: &AppState,
    estimate: impl FnOnce(&Estimator) -> Result<Estimate, EstimateError>,
) -> Result<Estimate, EstimateError> {
    let start_time = Instant::now();
    let result = estimate(&state.estimator);
    let processing_time = start_time.elapsed();

    match &result {
        Ok(estimate) => {
            state
                .metrics
                .record_estimate(processing_time, estimate.loss_level.as_str());
            state.metrics.record_spread(&estimate.model_estimates);
            info!(
                record_id = %estimate.record_id,
                economic_loss = estimate.economic_loss_million,
                loss_level = ?estimate.loss_level,
                processing_time_us = processing_time.as_micros(),
                "Estimate served"
            );
        }
        Err(e) => {
            state
                .metrics
                .record_rejection(processing_time, e.kind(), e.is_validation());
            if e.is_validation() {
                warn!(kind = e.kind(), field = ?e.field(), error = %e, "Input rejected");
            } else {
                error!(error = %e, "Inference failed");
            }
        }
    }
    result
}

fn error_status(error: &EstimateError) -> StatusCode {
    if error.is_validation() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn render(state: &AppState, status: StatusCode, page: &PageView) -> Response {
    match state.renderer.render(page) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

/// Form pre-filled with the defaults
async fn index_handler(State(state): State<AppState>) -> Response {
    let schema = state.estimator.schema();
    let display = &state.estimator.display().format;
    let page = PageView::for_record(schema, &schema.default_record(), display);
    render(&state, StatusCode::OK, &page)
}

/// Form submission
async fn submit_handler(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let schema = state.estimator.schema();
    let display = &state.estimator.display().format;
    let result = run_estimate(&state, |estimator| {
        estimator.estimate_form(&form).map(|(_, estimate)| estimate)
    });

    match result {
        Ok(estimate) => {
            let page = PageView::for_record(schema, &estimate.inputs, display)
                .with_estimate(&estimate, display);
            render(&state, StatusCode::OK, &page)
        }
        Err(e) => {
            let page = PageView::new(schema, &form, display).with_error(&e);
            render(&state, error_status(&e), &page)
        }
    }
}

/// JSON record in, JSON estimate out
async fn estimate_handler(
    State(state): State<AppState>,
    payload: Result<Json<WasteRecord>, JsonRejection>,
) -> Result<Json<Estimate>, (StatusCode, Json<ErrorResponse>)> {
    let Json(record) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed estimate request");
        (
            rejection.status(),
            Json(ErrorResponse {
                error: rejection.body_text(),
                kind: "invalid_request".to_string(),
                field: None,
            }),
        )
    })?;

    run_estimate(&state, |estimator| estimator.estimate(&record))
        .map(Json)
        .map_err(|e| (error_status(&e), Json(e.to_response())))
}

async fn schema_handler(State(state): State<AppState>) -> Json<SchemaResponse> {
    let estimator = &state.estimator;
    let extractor = estimator.extractor();
    Json(SchemaResponse {
        contract: extractor.contract().clone(),
        fields: estimator.schema().fields(),
        scaler: extractor.scaler().kind(),
        encoded_columns: extractor.encoders().columns().map(str::to_string).collect(),
        models: estimator.engine().model_names(),
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        models: state.estimator.engine().model_names(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, FormConfig};
    use crate::form::FormSchema;
    use crate::models::loader::LoadedModel;
    use crate::models::InferenceEngine;
    use crate::testing;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<ServiceMetrics>) {
        create_app_with(testing::regressors())
    }

    fn create_app_with(regressors: Vec<LoadedModel>) -> (Router, Arc<ServiceMetrics>) {
        let config = AppConfig::default();
        let estimator = Estimator::new(
            FormSchema::new(FormConfig::default()).unwrap(),
            testing::extractor(),
            InferenceEngine::new(regressors, Some(testing::classifier()), &config.models),
            config.display,
        )
        .unwrap();
        let metrics = Arc::new(ServiceMetrics::new());
        let state = AppState::new(estimator, metrics.clone()).unwrap();
        (create_router(state), metrics)
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Predict economic loss"));
        assert!(!html.contains("Estimated economic loss"));
    }

    #[tokio::test]
    async fn test_form_submission() {
        let (app, metrics) = create_test_app();
        let body = "country=France&year=2022&food_category=Dairy+Products\
                    &total_waste_tons=10000&avg_waste_per_capita_kg=50\
                    &population_million=50&household_waste_pct=30";

        let response = app.oneshot(form_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Estimated economic loss"));
        assert!(html.contains(" million"));
        assert_eq!(metrics.snapshot().estimates_produced, 1);
    }

    #[tokio::test]
    async fn test_form_submission_with_bad_number() {
        let (app, metrics) = create_test_app();
        let body = "country=France&year=2022&food_category=Dairy+Products\
                    &total_waste_tons=lots&avg_waste_per_capita_kg=50\
                    &population_million=50&household_waste_pct=30";

        let response = app.oneshot(form_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("Cannot estimate"));
        assert!(html.contains("Total Waste (Tons)"));
        assert!(!html.contains("Estimated economic loss"));
        // The submitted text is kept in the form
        assert!(html.contains(r#"value="lots""#));
        assert_eq!(metrics.snapshot().validation_failures, 1);
    }

    #[tokio::test]
    async fn test_api_estimate_unknown_category() {
        let (app, _) = create_test_app();
        let record = serde_json::json!({
            "country": "Atlantis",
            "year": 2022,
            "food_category": "Dairy Products",
            "total_waste_tons": 10000.0,
            "avg_waste_per_capita_kg": 50.0,
            "population_million": 50.0,
            "household_waste_pct": 30.0
        });

        let response = app.oneshot(json_request(&record)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, "unknown_category");
        assert_eq!(error.field.as_deref(), Some("Country"));
    }

    fn json_request(record: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/estimate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(record.to_string()))
            .unwrap()
    }

    fn france_record() -> serde_json::Value {
        serde_json::json!({
            "country": "France",
            "year": 2022,
            "food_category": "Dairy Products",
            "total_waste_tons": 10000.0,
            "avg_waste_per_capita_kg": 50.0,
            "population_million": 50.0,
            "household_waste_pct": 30.0
        })
    }

    #[tokio::test]
    async fn test_api_estimate_model_failure() {
        let (app, metrics) = create_app_with(vec![testing::overflowing_regressor("lasso")]);

        let response = app.oneshot(json_request(&france_record())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, "model_failure");
        assert_eq!(error.field, None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.model_failures, 1);
        assert_eq!(snapshot.validation_failures, 0);
        assert_eq!(snapshot.estimates_produced, 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = create_test_app();

        let response = app
            .clone()
            .oneshot(json_request(&france_record()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["estimates_produced"], 1);
        assert_eq!(snapshot["model_failures"], 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app();

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
        assert!(health.models.contains(&"lasso".to_string()));
    }
}
