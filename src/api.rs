// Inbound HTTP surface: a single rates endpoint plus a health check

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::booking::parse_booking_request;
use crate::gateway::RatesResult;
use crate::service::{RatesService, ServiceError};
use crate::validation::{ValidationErrors, Violation};

const RAW_INPUT_ECHO_CHARS: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RatesService>,
    // Include the error source chain in 500 responses
    pub expose_error_trace: bool,
}

/// Response envelope shared by every outcome of the rates endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RatesResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<String>,
}

impl ApiResponse {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            data: None,
            errors: None,
            error: None,
            trace: None,
            received_method: None,
            json_error: None,
            raw_input: None,
        }
    }

    pub fn rates(data: RatesResult) -> Self {
        Self {
            data: Some(data),
            ..Self::new(true, "Rates fetched successfully")
        }
    }

    pub fn validation_failed(errors: ValidationErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(false, "Validation failed")
        }
    }

    pub fn method_not_allowed(method: &Method) -> Self {
        Self {
            received_method: Some(method.to_string()),
            ..Self::new(false, "Method not allowed. Use POST.")
        }
    }

    pub fn invalid_json(json_error: String, raw_input: String) -> Self {
        Self {
            json_error: Some(json_error),
            raw_input: Some(raw_input),
            ..Self::new(false, "Invalid JSON format")
        }
    }

    pub fn internal_error(error: String, trace: Option<Vec<String>>) -> Self {
        Self {
            error: Some(error),
            trace,
            ..Self::new(false, "An error occurred while processing your request")
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/", any(handle_rates))
        .route("/index.php", any(handle_rates))
        .route("/health", get(health_check))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn handle_rates(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ApiResponse::method_not_allowed(&method)),
        )
            .into_response();
    }

    let data: Value = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            let raw_input: String = String::from_utf8_lossy(&body)
                .chars()
                .take(RAW_INPUT_ECHO_CHARS)
                .collect();
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::invalid_json(e.to_string(), raw_input)),
            )
                .into_response();
        }
    };

    let request = match parse_booking_request(&data) {
        Ok(request) => request,
        Err(errors) => {
            info!(fields = ?errors.fields().collect::<Vec<_>>(), "Booking request failed validation");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::validation_failed(errors)),
            )
                .into_response();
        }
    };

    match state.service.fetch_rates(&request, &data).await {
        Ok(rates) => {
            info!(unit_name = %request.unit_name, "Rates fetched successfully");
            (StatusCode::OK, Json(ApiResponse::rates(rates))).into_response()
        }
        Err(ServiceError::Transform(e)) => {
            info!(error = %e, "Booking request rejected");
            let errors = ValidationErrors::from(Violation::from(&e));
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::validation_failed(errors)),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch rates");
            let trace = state.expose_error_trace.then(|| error_chain(&e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::internal_error(e.to_string(), trace)),
            )
                .into_response()
        }
    }
}

// Display of the error and each of its sources, outermost first
fn error_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };
    error!(panic = %detail, "Rates handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::internal_error(detail, None)),
    )
        .into_response()
}
