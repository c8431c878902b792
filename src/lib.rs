// SPDX-License-Identifier: MIT
//! Diagnostic HTTP service for exercising telemetry collection.
//!
//! Every request, in-process dependency, custom event, exception and (filtered) log
//! line becomes a [`telemetry::record::TelemetryRecord`] that flows through a
//! small pipeline before export:
//! * initializers recode 4xx requests as successful (`Overridden400s = "true"`) and
//!   tag every record with `customProp = customValue`;
//! * an ordered filter chain drops successful dependencies, synthetic traffic and
//!   dependencies faster than 100 ms;
//! * survivors are written as JSON lines.
//!
//! Spans additionally go through `tracing` + OpenTelemetry (see [`telemetry`]).
//!
//! # Feature Flags
//! * `console-log` – add a compact console formatter (file/line/thread id).
//! * `otlp-log` – enable an OTLP log exporter and bridge tracing events into logs.
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use crazy_api::api::{self, AppState};
//! use crazy_api::config::Settings;
//! use crazy_api::telemetry::client::TelemetryClient;
//! use crazy_api::telemetry::exporter::JsonLinesExporter;
//! use crazy_api::telemetry::pipeline::TelemetryPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Arc::new(Settings::load()?);
//!     let sink = Arc::new(JsonLinesExporter::stdout());
//!     let client = TelemetryClient::new(TelemetryPipeline::from_settings(&settings.telemetry, sink));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     api::serve(listener, AppState::new(settings, client), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
pub mod api;
pub mod config;
pub mod telemetry;
pub mod workload;
