// SPDX-License-Identifier: MIT
//! Telemetry: the record pipeline plus `tracing` + OpenTelemetry initialization.
//!
//! The record side is split into small pieces:
//!
//! * [`record`] – the telemetry data model.
//! * [`initializer`] – mutators applied to every record before filtering.
//! * [`processor`] – the ordered, short-circuiting filter chain.
//! * [`pipeline`] / [`client`] – lifecycle wiring and the handle used by handlers.
//! * [`exporter`] – terminal sinks.
//! * [`layer`] – bridges `tracing` events into trace records.
//!
//! This module itself installs the global subscriber:
//!
//! * [`TelemetryConfig`] – endpoint, resource metadata and log levels.
//! * [`init_telemetry`] – builds providers and layers and installs them.
//! * [`TelemetryHandle`] – allows explicit synchronous shutdown/flush.
//!
//! Feature flags (Cargo features) influence behavior:
//!
//! * `console-log` – add a compact console formatting layer (on by default).
//! * `otlp-log` – enable OTLP log exporter + tracing bridge (converts tracing events to logs).
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use crazy_api::telemetry::{init_telemetry, TelemetryConfig};
//! use crazy_api::telemetry::client::TelemetryClient;
//! use crazy_api::telemetry::exporter::JsonLinesExporter;
//! use crazy_api::telemetry::pipeline::TelemetryPipeline;
//!
//! fn main() -> anyhow::Result<()> {
//!     let pipeline = TelemetryPipeline::builder(Arc::new(JsonLinesExporter::stdout())).build();
//!     let client = TelemetryClient::new(pipeline);
//!     let handle = init_telemetry(&TelemetryConfig::default(), &client)?;
//!     // ... application logic ...
//!     handle.shutdown()?; // ensure final spans exported
//!     Ok(())
//! }
//! ```
//!
//! # Shutdown
//! Call [`TelemetryHandle::shutdown`] before exiting the Tokio runtime to flush any remaining batches.
//!
//! # Threading Model
//! Batch exporters spawn worker threads (using the blocking HTTP client). The record
//! pipeline runs synchronously on whichever thread emits the record.
pub mod client;
pub mod exporter;
pub mod initializer;
pub mod layer;
pub mod pipeline;
pub mod processor;
pub mod record;

use anyhow::Result;
use opentelemetry::{global, KeyValue};
#[cfg(feature = "otlp-log")]
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
#[cfg(feature = "otlp-log")]
use opentelemetry_otlp::LogExporter;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
#[cfg(feature = "otlp-log")]
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
#[cfg(feature = "console-log")]
use tracing_subscriber::fmt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

use self::client::TelemetryClient;
use self::layer::TelemetryLayer;
use crate::config::Settings;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Configuration used when initializing telemetry.
///
/// [`Default`] reads the standard environment variables:
/// * `OTEL_EXPORTER_OTLP_ENDPOINT` – base endpoint (e.g. `http://localhost:4318`).
/// * `OTEL_SERVICE_NAME` – service name resource attribute.
/// * `RUST_ENV` – deployment environment (added as `deployment.environment`).
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Base OTLP endpoint (without per-signal suffix); no exporter is installed when `None`.
    pub endpoint: Option<String>,
    /// Service name reported in resource attributes (`service.name`).
    pub service_name: String,
    /// Service version reported in resource attributes (`service.version`).
    pub service_version: String,
    /// Console and span filter directive; `RUST_LOG` takes precedence.
    pub console_level: String,
    /// Filter directive for events bridged into trace records.
    pub record_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for TelemetryConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            endpoint: settings.telemetry.otlp_endpoint.clone(),
            service_name: settings.telemetry.service_name.clone(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            console_level: settings.log.level.clone(),
            record_level: settings.telemetry.log_level.clone(),
        }
    }
}

/// Handle allowing explicit synchronous shutdown of telemetry providers.
///
/// Dropping the handle without calling [`TelemetryHandle::shutdown`] may result in
/// losing final batches, depending on exporter internals.
pub struct TelemetryHandle {
    tracer_provider: SdkTracerProvider,
    #[cfg(feature = "otlp-log")]
    logger_provider: Option<SdkLoggerProvider>,
}

impl TelemetryHandle {
    /// Flush and shutdown all configured telemetry providers.
    ///
    /// If one or more providers report an error, a combined `anyhow::Error`
    /// including messages for each failing component is returned.
    pub fn shutdown(self) -> Result<()> {
        let mut errs = Vec::new();
        if let Err(e) = self.tracer_provider.shutdown() {
            errs.push(format!("tracer: {e}"));
        }
        #[cfg(feature = "otlp-log")]
        if let Some(Err(e)) = self.logger_provider.map(|provider| provider.shutdown()) {
            errs.push(format!("logger: {e}"));
        }
        if errs.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(errs.join(", "))
        }
    }
}

/// Initialize tracing, the record bridge and (optionally) OTLP export.
///
/// Installs a global tracer provider and a subscriber registry composed of:
/// console formatting (`console-log`), the OTLP log bridge (`otlp-log`, only with an
/// endpoint), the OpenTelemetry span layer, and a [`TelemetryLayer`] feeding `client`
/// with its own `record_level` targets.
/// Console output goes to stderr.
///
/// # Errors
/// Returns an error if an exporter builder fails (e.g. invalid endpoint URL), if a
/// filter directive does not parse, or if a global subscriber is already installed.
pub fn init_telemetry(cfg: &TelemetryConfig, client: &TelemetryClient) -> Result<TelemetryHandle> {
    let resource = Resource::builder()
        .with_service_name(cfg.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", cfg.service_version.clone()),
            KeyValue::new(
                "deployment.environment",
                std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".into()),
            ),
        ])
        .build();

    // Exporters (HTTP binary OTLP) only when an endpoint is configured.
    let base = cfg.endpoint.as_deref().map(|endpoint| endpoint.trim_end_matches('/'));
    let mut tracer_builder = SdkTracerProvider::builder().with_resource(resource.clone());
    if let Some(base) = base {
        let span_exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(format!("{}/v1/traces", base))
            .build()?;
        tracer_builder = tracer_builder.with_batch_exporter(span_exporter);
    }
    let tracer_provider = tracer_builder.build();
    global::set_tracer_provider(tracer_provider.clone());

    let mut layers: Vec<BoxedLayer> = Vec::new();

    // stderr, so JSON-lines records on stdout stay machine-readable.
    #[cfg(feature = "console-log")]
    layers.push(console_layer(&cfg.console_level, std::io::stderr)?);

    #[cfg(feature = "otlp-log")]
    let logger_provider = match base {
        Some(base) => {
            let log_exporter = LogExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(format!("{}/v1/logs", base))
                .build()?;
            let provider = SdkLoggerProvider::builder()
                .with_batch_exporter(log_exporter)
                .with_resource(resource.clone())
                .build();
            layers.push(
                OpenTelemetryTracingBridge::new(&provider)
                    .with_filter(console_filter(&cfg.console_level)?)
                    .boxed(),
            );
            Some(provider)
        }
        None => None,
    };

    layers.push(
        OpenTelemetryLayer::new(global::tracer(env!("CARGO_PKG_NAME")))
            .with_filter(console_filter(&cfg.console_level)?)
            .boxed(),
    );
    // No per-layer filter: the bridge must see every `operation` span.
    layers.push(
        TelemetryLayer::new(client.clone())
            .with_targets(cfg.record_level.parse::<Targets>()?)
            .boxed(),
    );

    tracing_subscriber::registry().with(layers).try_init()?;

    Ok(TelemetryHandle {
        tracer_provider,
        #[cfg(feature = "otlp-log")]
        logger_provider,
    })
}

#[cfg(feature = "console-log")]
fn console_layer<W>(level: &str, writer: W) -> Result<BoxedLayer>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    Ok(fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .with_filter(console_filter(level)?)
        .boxed())
}

fn console_filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?)
}
