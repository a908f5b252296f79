// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Observability instruments of the processor.
//!
//! Operation outcomes are counted per `(model, rule, outcome)`, inference
//! latency is tracked per model, and two gauges expose the active rule count
//! and per-model metadata availability. Instruments are created unregistered;
//! call [`ProcessorMetrics::register_on`] to expose them on a registry.

use prometheus::{
    HistogramOpts, HistogramVec, IntGauge, IntGaugeVec, IntCounterVec, Opts, Registry,
};

/// The label set of the operations counter.
const OPERATION_LABELS: &[&str] = &["model", "rule", "outcome"];

/// Counters and gauges describing processor behavior.
#[derive(Clone)]
pub struct ProcessorMetrics {
    operations: IntCounterVec,
    request_duration: HistogramVec,
    active_rules: IntGauge,
    metadata_availability: IntGaugeVec,
}

impl ProcessorMetrics {
    /// Creates the instrument set, unregistered.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            operations: IntCounterVec::new(
                Opts::new(
                    "inference_processor_operations_total",
                    "Inference operations by model, rule index and outcome.",
                ),
                OPERATION_LABELS,
            )?,
            request_duration: HistogramVec::new(
                HistogramOpts::new(
                    "inference_processor_request_duration_seconds",
                    "Latency of ModelInfer calls per model.",
                )
                .buckets(vec![
                    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
                &["model"],
            )?,
            active_rules: IntGauge::new(
                "inference_processor_active_rules",
                "Number of compiled rules in the running configuration.",
            )?,
            metadata_availability: IntGaugeVec::new(
                Opts::new(
                    "inference_processor_model_metadata_available",
                    "Whether metadata for a model was last fetched successfully.",
                ),
                &["model"],
            )?,
        })
    }

    /// Registers every instrument on `registry`.
    pub fn register_on(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.operations.clone()))?;
        registry.register(Box::new(self.request_duration.clone()))?;
        registry.register(Box::new(self.active_rules.clone()))?;
        registry.register(Box::new(self.metadata_availability.clone()))?;
        Ok(())
    }

    pub(crate) fn record_outcome(&self, model: &str, rule_index: usize, outcome: &str) {
        self.operations
            .with_label_values(&[model, &rule_index.to_string(), outcome])
            .inc();
    }

    pub(crate) fn record_outcomes(&self, model: &str, rule_index: usize, outcome: &str, count: u64) {
        if count == 0 {
            return;
        }
        self.operations
            .with_label_values(&[model, &rule_index.to_string(), outcome])
            .inc_by(count);
    }

    pub(crate) fn observe_request_duration(&self, model: &str, seconds: f64) {
        self.request_duration
            .with_label_values(&[model])
            .observe(seconds);
    }

    pub(crate) fn set_active_rules(&self, count: usize) {
        self.active_rules.set(count as i64);
    }

    pub(crate) fn set_metadata_available(&self, model: &str, available: bool) {
        self.metadata_availability
            .with_label_values(&[model])
            .set(i64::from(available));
    }

    #[cfg(test)]
    pub(crate) fn outcome_count(&self, model: &str, rule_index: usize, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[model, &rule_index.to_string(), outcome])
            .get()
    }
}
