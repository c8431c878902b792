// SPDX-License-Identifier: MIT
//! The record lifecycle: initializers, host defaults, then the processor chain.
use std::sync::Arc;
use std::time::Duration;

use super::initializer::{Convert4xxToSuccess, CustomPropertyInitializer, TelemetryInitializer};
use super::processor::{
    FastDependencyFilter, ProcessorChain, ProcessorChainBuilder, SuccessfulDependencyFilter,
    SyntheticRequestFilter, TelemetryProcessor, TelemetrySink,
};
use super::record::{TelemetryData, TelemetryRecord};
use crate::config::TelemetrySettings;

pub struct TelemetryPipeline {
    initializers: Vec<Box<dyn TelemetryInitializer>>,
    chain: ProcessorChain,
}

impl TelemetryPipeline {
    pub fn builder(sink: Arc<dyn TelemetrySink>) -> TelemetryPipelineBuilder {
        TelemetryPipelineBuilder {
            initializers: Vec::new(),
            chain: ProcessorChain::builder(sink),
        }
    }

    /// Standard wiring, each component individually switchable from configuration.
    pub fn from_settings(settings: &TelemetrySettings, sink: Arc<dyn TelemetrySink>) -> Self {
        let filters = &settings.filters;
        let initializers = &settings.initializers;
        let mut builder = Self::builder(sink);

        if filters.successful_dependencies {
            builder = builder.processor(SuccessfulDependencyFilter);
        }
        if filters.synthetic_requests {
            builder = builder.processor(SyntheticRequestFilter);
        }
        if filters.fast_dependencies {
            builder = builder.processor(FastDependencyFilter {
                threshold: Duration::from_millis(filters.fast_dependency_threshold_ms),
            });
        }
        if initializers.convert_4xx_to_success {
            builder = builder.initializer(Convert4xxToSuccess);
        }
        if initializers.custom_property {
            builder = builder.initializer(CustomPropertyInitializer::new(
                initializers.custom_property_key.clone(),
                initializers.custom_property_value.clone(),
            ));
        }
        builder.build()
    }

    pub fn track(&self, mut record: TelemetryRecord) {
        for initializer in &self.initializers {
            initializer.initialize(&mut record);
        }
        apply_default_success(&mut record);
        self.chain.process(record);
    }
}

/// Requests nobody ruled on succeed when their code parses below 400.
fn apply_default_success(record: &mut TelemetryRecord) {
    if let TelemetryData::Request(request) = &mut record.data {
        if request.success.is_none() {
            let code = request.response_code.trim().parse::<i32>();
            request.success = Some(matches!(code, Ok(code) if code < 400));
        }
    }
}

pub struct TelemetryPipelineBuilder {
    initializers: Vec<Box<dyn TelemetryInitializer>>,
    chain: ProcessorChainBuilder,
}

impl TelemetryPipelineBuilder {
    pub fn initializer(mut self, initializer: impl TelemetryInitializer + 'static) -> Self {
        self.initializers.push(Box::new(initializer));
        self
    }

    pub fn processor(mut self, processor: impl TelemetryProcessor + 'static) -> Self {
        self.chain = self.chain.stage(processor);
        self
    }

    pub fn build(self) -> TelemetryPipeline {
        TelemetryPipeline {
            initializers: self.initializers,
            chain: self.chain.build(),
        }
    }
}
