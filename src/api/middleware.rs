// SPDX-License-Identifier: MIT
//! Request tracking middleware and the per-request telemetry extractor.
use std::any::Any;
use std::convert::Infallible;

use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::ApiError;
use super::AppState;
use crate::telemetry::client::TelemetryClient;
use crate::telemetry::record::OperationContext;

/// Header set by availability tests.
pub const SYNTHETIC_RUN_ID_HEADER: &str = "synthetictest-runid";
/// Explicit synthetic source, for monitors that want to name themselves.
pub const SYNTHETIC_SOURCE_HEADER: &str = "x-synthetic-source";
pub const AVAILABILITY_MONITORING_SOURCE: &str = "Application Insights Availability Monitoring";
pub const BOT_SOURCE: &str = "Bot";

const BOT_USER_AGENT_MARKERS: [&str; 6] = ["search", "spider", "crawl", "bot", "monitor", "alwayson"];

tokio::task_local! {
    /// Operation of the request being served, visible to the panic responder.
    static CURRENT_OPERATION: OperationContext;
}

/// Operation context and cancellation signal of the current request.
///
/// Outside the tracking middleware this yields a fresh context and a token that
/// never fires.
#[derive(Clone, Debug, Default)]
pub struct RequestTelemetry {
    pub context: OperationContext,
    pub cancellation: CancellationToken,
}

impl<S> FromRequestParts<S> for RequestTelemetry
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Classify the caller as synthetic traffic from its headers.
pub fn synthetic_source(headers: &HeaderMap) -> Option<String> {
    if headers.contains_key(SYNTHETIC_RUN_ID_HEADER) {
        return Some(AVAILABILITY_MONITORING_SOURCE.to_string());
    }
    if let Some(source) = headers
        .get(SYNTHETIC_SOURCE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|source| !source.is_empty())
    {
        return Some(source.to_string());
    }

    let user_agent = headers.get(USER_AGENT)?.to_str().ok()?.to_ascii_lowercase();
    BOT_USER_AGENT_MARKERS
        .iter()
        .any(|marker| user_agent.contains(marker))
        .then(|| BOT_SOURCE.to_string())
}

/// Records one request telemetry item per request.
///
/// The request is named after its matched route. A request-scoped cancellation
/// token is cancelled once this future completes or is dropped, so work spawned
/// by handlers stops when the client goes away.
pub async fn track_requests(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let context = OperationContext::new(format!("{} {}", request.method(), route))
        .with_synthetic_source(synthetic_source(request.headers()));

    let cancellation = CancellationToken::new();
    let _cancel_on_drop = cancellation.clone().drop_guard();
    request.extensions_mut().insert(RequestTelemetry {
        context: context.clone(),
        cancellation,
    });

    let span = tracing::info_span!(
        "operation",
        operation_id = context.id.as_deref(),
        operation_name = context.name.as_deref(),
        synthetic_source = context.synthetic_source.as_deref(),
    );
    let scope = state
        .telemetry
        .start_request(context.clone(), request.uri().to_string());

    let response = CURRENT_OPERATION
        .scope(context, next.run(request))
        .instrument(span)
        .await;
    scope.complete(response.status().as_u16());
    response
}

/// Turn a handler panic into a 500 response and an exception record.
///
/// The exception carries the operation of the request that panicked, so it is
/// correlated with it and filtered like it.
pub fn panic_response(telemetry: &TelemetryClient, panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "handler panicked".to_string()
    };

    let context = CURRENT_OPERATION.try_with(Clone::clone).unwrap_or_default();
    telemetry.track_exception("panic", message.clone(), context);
    ApiError::internal(message).into_response()
}
