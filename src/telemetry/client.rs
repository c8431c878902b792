// SPDX-License-Identifier: MIT
//! Cheap, clonable handle used by application code to emit telemetry.
//!
//! Timed operations go through RAII scopes: a [`RequestScope`] or
//! [`DependencyScope`] measures from creation and emits exactly one record,
//! either on `complete` or, if the surrounding future was dropped first, on drop
//! as an abandoned (failed) operation.
use std::sync::Arc;
use std::time::Instant;

use super::pipeline::TelemetryPipeline;
use super::record::{
    OperationContext, Properties, SeverityLevel, TelemetryData, TelemetryRecord,
};

/// Response code recorded for requests abandoned before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;
/// Result code recorded for dependencies abandoned before completion.
pub const CANCELLED_RESULT: &str = "Cancelled";

#[derive(Clone)]
pub struct TelemetryClient {
    pipeline: Arc<TelemetryPipeline>,
}

impl TelemetryClient {
    pub fn new(pipeline: TelemetryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn track(&self, record: TelemetryRecord) {
        self.pipeline.track(record);
    }

    /// Emit a named custom event with string properties.
    pub fn track_event<I, K, V>(&self, name: impl Into<String>, context: OperationContext, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = TelemetryRecord::event(name).with_context(context);
        record
            .properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.track(record);
    }

    pub fn track_trace(&self, message: impl Into<String>, severity: SeverityLevel, context: OperationContext, properties: Properties) {
        let mut record = TelemetryRecord::trace(message, severity).with_context(context);
        record.properties = properties;
        self.track(record);
    }

    pub fn track_exception(&self, type_name: impl Into<String>, message: impl Into<String>, context: OperationContext) {
        self.track(TelemetryRecord::exception(type_name, message).with_context(context));
    }

    pub fn start_request(&self, context: OperationContext, url: impl Into<String>) -> RequestScope {
        let name = context.name.clone().unwrap_or_default();
        let mut record = TelemetryRecord::request(name, CLIENT_CLOSED_REQUEST.to_string(), Default::default())
            .with_context(context);
        if let TelemetryData::Request(request) = &mut record.data {
            request.url = Some(url.into());
        }
        RequestScope {
            client: self.clone(),
            started: Instant::now(),
            record: Some(record),
        }
    }

    pub fn start_dependency(
        &self,
        name: impl Into<String>,
        dependency_type: impl Into<String>,
        target: impl Into<String>,
        context: OperationContext,
    ) -> DependencyScope {
        DependencyScope {
            client: self.clone(),
            started: Instant::now(),
            record: Some(
                TelemetryRecord::dependency(name, dependency_type, target, None, Default::default())
                    .with_context(context),
            ),
        }
    }
}

/// An incoming request in flight.
pub struct RequestScope {
    client: TelemetryClient,
    started: Instant,
    record: Option<TelemetryRecord>,
}

impl RequestScope {
    /// Record the response code; success is left to initializers and host defaults.
    pub fn complete(mut self, response_code: u16) {
        self.finish(response_code, None);
    }

    fn finish(&mut self, response_code: u16, success: Option<bool>) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        if let TelemetryData::Request(request) = &mut record.data {
            request.response_code = response_code.to_string();
            request.success = success;
            request.duration = self.started.elapsed();
        }
        self.client.track(record);
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.finish(CLIENT_CLOSED_REQUEST, Some(false));
    }
}

/// An outbound (or in-process) call in flight.
pub struct DependencyScope {
    client: TelemetryClient,
    started: Instant,
    record: Option<TelemetryRecord>,
}

impl DependencyScope {
    pub fn complete(mut self, success: bool, result_code: impl Into<String>) {
        self.finish(success, result_code.into());
    }

    fn finish(&mut self, success: bool, result_code: String) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        if let TelemetryData::Dependency(dependency) = &mut record.data {
            dependency.success = Some(success);
            dependency.result_code = Some(result_code);
            dependency.duration = self.started.elapsed();
        }
        self.client.track(record);
    }
}

impl Drop for DependencyScope {
    fn drop(&mut self) {
        self.finish(false, CANCELLED_RESULT.to_string());
    }
}
