// SPDX-License-Identifier: MIT
//! Ordered, short-circuiting processor chain.
//!
//! Every stage receives the record together with a [`Next`] continuation over
//! the rest of the chain. Calling [`Next::run`] forwards the record; returning
//! without calling it drops the record silently. The last continuation hands the
//! record to the terminal [`TelemetrySink`].
use std::sync::Arc;
use std::time::Duration;

use super::record::TelemetryRecord;

/// Dependency calls shorter than this are dropped by [`FastDependencyFilter`].
pub const FAST_DEPENDENCY_THRESHOLD: Duration = Duration::from_millis(100);

/// Terminal stage of a chain: receives every record that survived all filters.
pub trait TelemetrySink: Send + Sync {
    fn export(&self, record: TelemetryRecord);
}

/// A single chain stage.
///
/// Stages must not block; a panic inside a stage is a bug surfaced to the caller.
pub trait TelemetryProcessor: Send + Sync {
    fn process(&self, record: TelemetryRecord, next: Next<'_>);
}

impl<F> TelemetryProcessor for F
where
    F: for<'a> Fn(TelemetryRecord, Next<'a>) + Send + Sync,
{
    fn process(&self, record: TelemetryRecord, next: Next<'_>) {
        self(record, next)
    }
}

/// Wrap a closure as a chain stage, in the manner of `tower::service_fn`.
pub fn processor_fn<F>(f: F) -> F
where
    F: for<'a> Fn(TelemetryRecord, Next<'a>) + Send + Sync,
{
    f
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    remaining: &'a [Box<dyn TelemetryProcessor>],
    sink: &'a dyn TelemetrySink,
}

impl Next<'_> {
    /// Forward `record` to the following stage, or to the sink after the last one.
    pub fn run(self, record: TelemetryRecord) {
        match self.remaining.split_first() {
            Some((stage, remaining)) => stage.process(
                record,
                Next {
                    remaining,
                    sink: self.sink,
                },
            ),
            None => self.sink.export(record),
        }
    }
}

pub struct ProcessorChain {
    stages: Vec<Box<dyn TelemetryProcessor>>,
    sink: Arc<dyn TelemetrySink>,
}

impl ProcessorChain {
    pub fn builder(sink: Arc<dyn TelemetrySink>) -> ProcessorChainBuilder {
        ProcessorChainBuilder {
            stages: Vec::new(),
            sink,
        }
    }

    pub fn process(&self, record: TelemetryRecord) {
        Next {
            remaining: &self.stages,
            sink: self.sink.as_ref(),
        }
        .run(record)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

pub struct ProcessorChainBuilder {
    stages: Vec<Box<dyn TelemetryProcessor>>,
    sink: Arc<dyn TelemetrySink>,
}

impl ProcessorChainBuilder {
    /// Append a stage; stages run in insertion order.
    pub fn stage(mut self, stage: impl TelemetryProcessor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> ProcessorChain {
        ProcessorChain {
            stages: self.stages,
            sink: self.sink,
        }
    }
}

/// Drops dependency calls that succeeded.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuccessfulDependencyFilter;

impl TelemetryProcessor for SuccessfulDependencyFilter {
    fn process(&self, record: TelemetryRecord, next: Next<'_>) {
        if record
            .as_dependency()
            .is_some_and(|dependency| dependency.success == Some(true))
        {
            return;
        }
        next.run(record)
    }
}

/// Drops anything produced by synthetic traffic, whatever its kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticRequestFilter;

impl TelemetryProcessor for SyntheticRequestFilter {
    fn process(&self, record: TelemetryRecord, next: Next<'_>) {
        if record.context.is_synthetic() {
            return;
        }
        next.run(record)
    }
}

/// Drops dependency calls faster than `threshold`.
#[derive(Clone, Copy, Debug)]
pub struct FastDependencyFilter {
    pub threshold: Duration,
}

impl Default for FastDependencyFilter {
    fn default() -> Self {
        Self {
            threshold: FAST_DEPENDENCY_THRESHOLD,
        }
    }
}

impl TelemetryProcessor for FastDependencyFilter {
    fn process(&self, record: TelemetryRecord, next: Next<'_>) {
        if record
            .as_dependency()
            .is_some_and(|dependency| dependency.duration < self.threshold)
        {
            return;
        }
        next.run(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::exporter::MemorySink;
    use crate::telemetry::record::OperationContext;

    fn standard_chain(sink: Arc<MemorySink>) -> ProcessorChain {
        ProcessorChain::builder(sink)
            .stage(SuccessfulDependencyFilter)
            .stage(SyntheticRequestFilter)
            .stage(FastDependencyFilter::default())
            .build()
    }

    fn dependency(success: bool, millis: u64) -> TelemetryRecord {
        TelemetryRecord::dependency("call", "HTTP", "backend", Some(success), Duration::from_millis(millis))
    }

    #[test]
    fn drops_successful_dependencies() {
        let sink = Arc::new(MemorySink::default());
        let chain = standard_chain(sink.clone());

        chain.process(dependency(true, 500));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn drops_synthetic_records_of_any_kind() {
        let sink = Arc::new(MemorySink::default());
        let chain = standard_chain(sink.clone());
        let synthetic = OperationContext::new("GET /status").with_synthetic_source(Some("Bot".into()));

        chain.process(TelemetryRecord::request("GET /status", "200", Duration::from_millis(3)).with_context(synthetic.clone()));
        chain.process(TelemetryRecord::trace("hello", crate::telemetry::record::SeverityLevel::Warning).with_context(synthetic.clone()));
        chain.process(dependency(false, 500).with_context(synthetic));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn empty_synthetic_marker_is_not_synthetic() {
        let sink = Arc::new(MemorySink::default());
        let chain = standard_chain(sink.clone());
        let context = OperationContext::default().with_synthetic_source(Some(String::new()));

        chain.process(TelemetryRecord::event("ping").with_context(context));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn fast_dependency_threshold_is_strict() {
        let sink = Arc::new(MemorySink::default());
        let chain = standard_chain(sink.clone());

        chain.process(dependency(false, 50));
        chain.process(dependency(false, 99));
        assert!(sink.records().is_empty());

        let slow = dependency(false, 100);
        chain.process(slow.clone());
        assert_eq!(sink.records(), vec![slow]);
    }

    #[test]
    fn requests_are_never_dropped_by_dependency_filters() {
        let sink = Arc::new(MemorySink::default());
        let chain = standard_chain(sink.clone());

        let request = TelemetryRecord::request("GET /status", "404", Duration::from_millis(1));
        chain.process(request.clone());
        assert_eq!(sink.records(), vec![request]);
    }

    #[test]
    fn later_stages_only_see_survivors() {
        let sink = Arc::new(MemorySink::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observed = seen.clone();
        let chain = ProcessorChain::builder(sink.clone())
            .stage(SuccessfulDependencyFilter)
            .stage(processor_fn(move |record, next| {
                observed.lock().unwrap().push(record.kind());
                next.run(record)
            }))
            .build();

        chain.process(dependency(true, 500));
        chain.process(TelemetryRecord::metric("queue", 3.0));

        assert_eq!(*seen.lock().unwrap(), vec!["metric"]);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn stage_can_depend_on_earlier_mutation() {
        let sink = Arc::new(MemorySink::default());
        let chain = ProcessorChain::builder(sink.clone())
            .stage(processor_fn(|record, next| next.run(record.with_property("tier", "cold"))))
            .stage(processor_fn(|record, next| {
                if record.properties.get("tier").map(String::as_str) == Some("cold") {
                    return;
                }
                next.run(record)
            }))
            .build();

        chain.process(TelemetryRecord::event("archived"));
        assert!(sink.records().is_empty());
        assert_eq!(chain.len(), 2);
    }
}
