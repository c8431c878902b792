// SPDX-License-Identifier: MIT
//! Telemetry record model.
//!
//! A [`TelemetryRecord`] is one observed event (incoming request, outbound call,
//! log line, metric, exception or custom event) on its way to the exporter. The
//! kind-specific payload lives in [`TelemetryData`]; the property map and the
//! [`OperationContext`] are common to every kind.
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// String key/value properties attached to a record.
pub type Properties = BTreeMap<String, String>;

/// One telemetry item as seen by initializers and processors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub context: OperationContext,
    pub properties: Properties,
    #[serde(flatten)]
    pub data: TelemetryData,
}

/// Correlation data shared by every record produced while handling one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OperationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set when the traffic comes from an automated monitor rather than a real user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic_source: Option<String>,
}

impl OperationContext {
    /// Fresh context with a random operation id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().simple().to_string()),
            name: Some(name.into()),
            synthetic_source: None,
        }
    }

    pub fn with_synthetic_source(mut self, source: Option<String>) -> Self {
        self.synthetic_source = source;
        self
    }

    /// `true` only for a present, non-empty synthetic source marker.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic_source
            .as_deref()
            .is_some_and(|source| !source.is_empty())
    }
}

/// Kind-specific payload of a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryData {
    Trace(TraceData),
    Request(RequestData),
    Dependency(DependencyData),
    Metric(MetricData),
    Exception(ExceptionData),
    Event(EventData),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SeverityLevel {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceData {
    pub message: String,
    pub severity: SeverityLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw response code; parsed on demand since hosts may report non-numeric codes.
    pub response_code: String,
    /// `None` until an initializer or the pipeline default decides.
    pub success: Option<bool>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DependencyData {
    pub name: String,
    pub dependency_type: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    pub success: Option<bool>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricData {
    pub name: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExceptionData {
    pub type_name: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventData {
    pub name: String,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

impl TelemetryRecord {
    /// New record stamped with the current time and an empty context.
    pub fn new(data: TelemetryData) -> Self {
        Self {
            timestamp: Utc::now(),
            context: OperationContext::default(),
            properties: Properties::new(),
            data,
        }
    }

    pub fn trace(message: impl Into<String>, severity: SeverityLevel) -> Self {
        Self::new(TelemetryData::Trace(TraceData {
            message: message.into(),
            severity,
        }))
    }

    pub fn request(name: impl Into<String>, response_code: impl Into<String>, duration: Duration) -> Self {
        Self::new(TelemetryData::Request(RequestData {
            name: name.into(),
            url: None,
            response_code: response_code.into(),
            success: None,
            duration,
        }))
    }

    pub fn dependency(
        name: impl Into<String>,
        dependency_type: impl Into<String>,
        target: impl Into<String>,
        success: Option<bool>,
        duration: Duration,
    ) -> Self {
        Self::new(TelemetryData::Dependency(DependencyData {
            name: name.into(),
            dependency_type: dependency_type.into(),
            target: target.into(),
            result_code: None,
            success,
            duration,
        }))
    }

    pub fn metric(name: impl Into<String>, value: f64) -> Self {
        Self::new(TelemetryData::Metric(MetricData {
            name: name.into(),
            value,
        }))
    }

    pub fn exception(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TelemetryData::Exception(ExceptionData {
            type_name: type_name.into(),
            message: message.into(),
        }))
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self::new(TelemetryData::Event(EventData { name: name.into() }))
    }

    pub fn with_context(mut self, context: OperationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Short kind name, matching the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self.data {
            TelemetryData::Trace(_) => "trace",
            TelemetryData::Request(_) => "request",
            TelemetryData::Dependency(_) => "dependency",
            TelemetryData::Metric(_) => "metric",
            TelemetryData::Exception(_) => "exception",
            TelemetryData::Event(_) => "event",
        }
    }

    pub fn as_request(&self) -> Option<&RequestData> {
        match &self.data {
            TelemetryData::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_dependency(&self) -> Option<&DependencyData> {
        match &self.data {
            TelemetryData::Dependency(dependency) => Some(dependency),
            _ => None,
        }
    }
}
