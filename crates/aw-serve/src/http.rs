//! HTTP front end for the scoring service.

use std::sync::Arc;

use aw_types::AwError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::service::{ModelService, TransactionRecord};

pub const SERVICE_NAME: &str = "AML Detection System";
pub const PREDICT_PATH: &str = "/api/v1/predict";
pub const HEALTH_PATH: &str = "/health";

/// Lifecycle of the model behind the service.
#[derive(Debug, Default)]
pub enum ModelSlot {
    #[default]
    Loading,
    Ready(ModelService),
    Failed(String),
}

impl ModelSlot {
    /// Value of `model_status` in the health response.
    pub fn status(&self) -> String {
        match self {
            ModelSlot::Loading => "not_loaded".to_string(),
            ModelSlot::Ready(_) => "loaded".to_string(),
            ModelSlot::Failed(message) => format!("error: {message}"),
        }
    }
}

/// Shared service state, written once by the loader task.
pub type SharedModel = Arc<RwLock<ModelSlot>>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Model not loaded")]
    NotLoaded,

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AwError> for ApiError {
    fn from(err: AwError) -> Self {
        match err {
            AwError::Data(_) => ApiError::BadRequest(err.to_string()),
            AwError::Artifact(_) => ApiError::Unavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid JSON: {}", rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotLoaded | ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::BadRequest(msg) => warn!(detail = %msg, "rejected prediction request"),
            ApiError::NotLoaded => warn!("prediction requested before the model was loaded"),
            ApiError::Unavailable(msg) | ApiError::Internal(msg) => {
                error!(detail = %msg, status = status.as_u16(), "prediction failed")
            }
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

async fn handle_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

async fn health(State(model): State<SharedModel>) -> Json<Value> {
    let model_status = model.read().status();
    Json(json!({
        "status": "ok",
        "model_status": model_status,
        "service": SERVICE_NAME,
    }))
}

async fn predict(
    State(model): State<SharedModel>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let record: TransactionRecord = match body {
        Value::Object(map) => map,
        _ => return Err(ApiError::BadRequest("request body must be a JSON object".into())),
    };

    let guard = model.read();
    let ModelSlot::Ready(service) = &*guard else {
        return Err(ApiError::NotLoaded);
    };
    let prediction = service.predict(&record)?;
    serde_json::to_value(prediction)
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("failed to serialize prediction: {e}")))
}

/// Routes of the scoring service over `model`.
pub fn create_router(model: SharedModel) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(PREDICT_PATH, post(predict))
        .fallback(handle_404)
        .with_state(model)
}
