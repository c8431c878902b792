// SPDX-License-Identifier: MIT
//! Endpoints that produce specific telemetry signatures.
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

use super::error::ApiError;
use super::middleware::RequestTelemetry;
use super::AppState;
use crate::workload::{self, WorkloadError};

/// Dependency type recorded for work done inside the process.
pub const IN_PROC: &str = "InProc";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub status_code: Option<u16>,
    /// Name of a custom event to record alongside the request.
    pub event: Option<String>,
}

/// Log at every severity, then answer with the requested status code.
pub async fn status(
    State(state): State<AppState>,
    telemetry: RequestTelemetry,
    Query(query): Query<StatusQuery>,
) -> Result<StatusCode, ApiError> {
    let record_level = &state.settings.telemetry.log_level;
    info!(%record_level, "telemetry.log_level = {record_level}");

    let status = parse_status(query.status_code.unwrap_or(200))?;
    let status_code = status.as_u16();
    trace!(status_code, "Returning status code {status_code} with trace");
    debug!(status_code, "Returning status code {status_code} with debug");
    info!(status_code, "Returning status code {status_code} with information");
    warn!(status_code, "Returning status code {status_code} with warning");
    error!(status_code, "Returning status code {status_code} with error");
    crate::critical!(status_code, "Returning status code {status_code} with critical");

    if let Some(name) = query.event {
        state
            .telemetry
            .track_event(name, telemetry.context, [("statusCode", status_code.to_string())]);
    }
    Ok(status)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub status_code: u16,
    pub content_type: String,
    pub content: String,
}

/// Echo `content` back with the requested status and content type.
pub async fn payload(Json(payload): Json<Payload>) -> Result<Response, ApiError> {
    let status = parse_status(payload.status_code)?;
    let content_type = HeaderValue::from_str(&payload.content_type).map_err(|_| {
        ApiError::bad_request(
            "INVALID_CONTENT_TYPE",
            format!("Invalid content type: {:?}", payload.content_type),
        )
    })?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(payload.content))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Always panics with an integer division by zero.
pub async fn fail() -> Json<i32> {
    let divisor = std::hint::black_box(0);
    Json(1 / divisor)
}

/// Sleep for the given number of milliseconds.
pub async fn delay(
    State(state): State<AppState>,
    telemetry: RequestTelemetry,
    Path(milliseconds): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let dependency = state.telemetry.start_dependency(
        "delay",
        IN_PROC,
        format!("{milliseconds}ms"),
        telemetry.context,
    );
    let outcome = workload::delay(Duration::from_millis(milliseconds), &telemetry.cancellation).await;
    dependency.complete(outcome.is_ok(), result_code(&outcome));
    outcome?;
    Ok(StatusCode::OK)
}

/// Keep every core busy for the given number of milliseconds.
pub async fn cpu(
    State(state): State<AppState>,
    telemetry: RequestTelemetry,
    Path(milliseconds): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let dependency = state.telemetry.start_dependency(
        "cpu",
        IN_PROC,
        format!("{milliseconds}ms"),
        telemetry.context,
    );
    let outcome = workload::burn_cpu(Duration::from_millis(milliseconds), &telemetry.cancellation).await;
    dependency.complete(outcome.is_ok(), result_code(&outcome));
    outcome?;
    Ok(StatusCode::OK)
}

fn parse_status(code: u16) -> Result<StatusCode, ApiError> {
    StatusCode::from_u16(code).map_err(|_| {
        ApiError::bad_request(
            "INVALID_STATUS_CODE",
            format!("Invalid status code: {code}. Use a value between 100 and 999."),
        )
    })
}

fn result_code(outcome: &Result<(), WorkloadError>) -> &'static str {
    match outcome {
        Ok(()) => "Ok",
        Err(WorkloadError::Cancelled) => "Cancelled",
        Err(WorkloadError::Worker(_)) => "Failed",
    }
}
