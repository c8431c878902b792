// SPDX-License-Identifier: MIT
//! Bridge from `tracing` events to trace records.
//!
//! Every event that passes the layer's level targets becomes a [`TelemetryRecord`]
//! of kind trace and goes through the same pipeline as requests and dependencies.
//! Spans carrying `operation_id`, `operation_name` or `synthetic_source` fields
//! lend that context to the events recorded inside them.
//!
//! The level check happens in [`Layer::on_event`] rather than through a per-layer
//! filter. A filter would also hide spans below the record level (the INFO
//! `operation` span among them), and events inside them would lose their context.
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use super::client::TelemetryClient;
use super::record::{OperationContext, Properties, SeverityLevel};

/// Events under this target are never bridged, so exporter diagnostics cannot loop.
pub const INTERNAL_TARGET: &str = "crazy_api::telemetry::exporter";

/// Emit an error-level event recorded with [`SeverityLevel::Critical`].
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        ::tracing::error!(severity = "critical", $($arg)+)
    };
}

pub struct TelemetryLayer {
    client: TelemetryClient,
    targets: Targets,
}

impl TelemetryLayer {
    /// Bridge events of every level.
    pub fn new(client: TelemetryClient) -> Self {
        Self {
            client,
            targets: Targets::new().with_default(LevelFilter::TRACE),
        }
    }

    /// Only bridge events enabled by `targets`, e.g. `"warn"` or `"crazy_api=debug,warn"`.
    /// Spans are still tracked at every level.
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }
}

struct SpanOperation(OperationContext);

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = OperationVisitor::default();
        attrs.record(&mut visitor);
        if visitor.context == OperationContext::default() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanOperation(visitor.context));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(INTERNAL_TARGET)
            || !self.targets.would_enable(metadata.target(), metadata.level())
        {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let severity = match *metadata.level() {
            Level::TRACE | Level::DEBUG => SeverityLevel::Verbose,
            Level::INFO => SeverityLevel::Information,
            Level::WARN => SeverityLevel::Warning,
            Level::ERROR if visitor.critical => SeverityLevel::Critical,
            Level::ERROR => SeverityLevel::Error,
        };

        let context = ctx
            .event_scope(event)
            .and_then(|scope| {
                scope.into_iter().find_map(|span| {
                    let extensions = span.extensions();
                    extensions.get::<SpanOperation>().map(|op| op.0.clone())
                })
            })
            .unwrap_or_default();

        let mut properties = visitor.properties;
        properties.insert("category".to_string(), metadata.target().to_string());
        self.client
            .track_trace(visitor.message, severity, context, properties);
    }
}

#[derive(Default)]
struct OperationVisitor {
    context: OperationContext,
}

impl Visit for OperationVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        let slot = match field.name() {
            "operation_id" => &mut self.context.id,
            "operation_name" => &mut self.context.name,
            "synthetic_source" => &mut self.context.synthetic_source,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    critical: bool,
    properties: Properties,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "severity" => self.critical = value.eq_ignore_ascii_case("critical"),
            name => {
                self.properties.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}
