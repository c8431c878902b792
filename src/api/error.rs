// SPDX-License-Identifier: MIT
//! API error type and its JSON response shape.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::telemetry::client::CLIENT_CLOSED_REQUEST;
use crate::workload::WorkloadError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("request was cancelled")]
    Cancelled,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<WorkloadError> for ApiError {
    fn from(e: WorkloadError) -> Self {
        match e {
            WorkloadError::Cancelled => Self::Cancelled,
            WorkloadError::Worker(e) => Self::internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error, code) = match self {
            Self::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, "bad_request", code),
            Self::Cancelled => (
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT),
                "cancelled",
                "REQUEST_CANCELLED",
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "INTERNAL_ERROR",
            ),
        };

        if status.is_server_error() {
            tracing::error!(%message, "request failed");
        }

        (status, Json(ErrorBody { error, code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_maps_to_client_closed_request() {
        let response = ApiError::from(WorkloadError::Cancelled).into_response();
        assert_eq!(response.status().as_u16(), 499);
    }

    #[test]
    fn bad_request_keeps_status() {
        let response = ApiError::bad_request("INVALID_STATUS_CODE", "nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
