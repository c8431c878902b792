// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::{Context, Result};
use crazy_api::api::{self, AppState};
use crazy_api::config::Settings;
use crazy_api::telemetry::client::TelemetryClient;
use crazy_api::telemetry::exporter::JsonLinesExporter;
use crazy_api::telemetry::pipeline::TelemetryPipeline;
use crazy_api::telemetry::processor::TelemetrySink;
use crazy_api::telemetry::{init_telemetry, TelemetryConfig};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::load()?);

    let sink: Arc<dyn TelemetrySink> = match &settings.telemetry.export_path {
        Some(path) => Arc::new(
            JsonLinesExporter::file(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Arc::new(JsonLinesExporter::stdout()),
    };
    let client = TelemetryClient::new(TelemetryPipeline::from_settings(&settings.telemetry, sink));
    let telemetry = init_telemetry(&TelemetryConfig::from(settings.as_ref()), &client)?;

    trace!("Trace");
    debug!("Debug");
    info!("Information");
    warn!("Warning");
    error!("Error");
    crazy_api::critical!("Critical");

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let served = api::serve(listener, AppState::new(settings, client), shutdown_signal()).await;

    telemetry.shutdown()?;
    served
}
