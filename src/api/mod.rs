// SPDX-License-Identifier: MIT
//! HTTP surface: router assembly and the serve loop.
//!
//! | Method | Path                   | Response                                        |
//! |--------|------------------------|-------------------------------------------------|
//! | GET    | `/status?statusCode=`  | empty body with the given status (default 200)  |
//! | POST   | `/payload`             | echoes `content` with `contentType`/`statusCode` |
//! | GET    | `/fail`                | 500 from a division by zero                      |
//! | GET    | `/delay/{milliseconds}`| 200 after sleeping                               |
//! | GET    | `/cpu/{milliseconds}`  | 200 after spinning every core                    |
pub mod error;
pub mod middleware;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Settings;
use crate::telemetry::client::TelemetryClient;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub telemetry: TelemetryClient,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, telemetry: TelemetryClient) -> Self {
        Self {
            settings,
            telemetry,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let telemetry = state.telemetry.clone();

    Router::new()
        .route("/status", get(routes::status))
        .route("/payload", post(routes::payload))
        .route("/fail", get(routes::fail))
        .route("/delay/{milliseconds}", get(routes::delay))
        .route("/cpu/{milliseconds}", get(routes::cpu))
        .layer(CatchPanicLayer::custom(move |panic| {
            middleware::panic_response(&telemetry, panic)
        }))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Outermost, so everything below logs inside the `operation` span.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::track_requests,
        ))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
