// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The processor orchestrator: locates inputs, runs inference, and appends
//! the materialized outputs to the in-flight batch.
//!
//! [`InferenceProcessor::process_metrics`] is additive and infallible: the
//! original data points are always forwarded unchanged, and a failing rule
//! never blocks another one (except configuration-level failures under
//! strict validation, which stop the remaining rules for the batch). Rules
//! run serially in declared order, so a rule may consume metrics emitted by
//! an earlier one.

use crate::client::InferenceClient;
use crate::config::{Config, Rule};
use crate::decode::materialize;
use crate::encode::encode_group;
use crate::error::{ConfigError, InferenceError, RuleError, outcome};
use crate::matcher::{ScopePath, group_points, match_rule};
use crate::metadata::{MetadataCache, validate_rule};
use crate::metrics::ProcessorMetrics;
use crate::pdata::opentelemetry::metrics::v1::{Metric, MetricsData};
use crate::proto::v2::inference::{ModelInferRequest, model_infer_request::InferInputTensor};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// A compiled, immutable metrics inference processor.
///
/// The processor may be shared across producer threads; every
/// [`process_metrics`](Self::process_metrics) invocation is independent and
/// owns its batch.
pub struct InferenceProcessor {
    rules: Vec<Rule>,
    client: InferenceClient,
    cache: MetadataCache,
    metrics: ProcessorMetrics,
    strict: bool,
}

impl InferenceProcessor {
    /// Compiles the configuration and builds the processor.
    ///
    /// With `strict_validation` enabled, every referenced model is checked
    /// for readiness and its metadata validated against the rule before the
    /// processor starts; any mismatch fails startup.
    pub async fn new(config: Config) -> Result<Self, ConfigError> {
        let rules = config.compile_rules()?;
        let metrics = ProcessorMetrics::new().map_err(|e| ConfigError::Observability {
            error: e.to_string(),
        })?;
        let client = InferenceClient::new(&config.grpc, config.timeout)?;
        let cache = MetadataCache::new(config.metadata_ttl);

        metrics.set_active_rules(rules.len());

        let processor = Self {
            rules,
            client,
            cache,
            metrics,
            strict: config.strict_validation,
        };

        if processor.strict {
            processor.validate_startup().await?;
        }

        Ok(processor)
    }

    /// The processor's observability instruments, for registry exposure.
    #[must_use]
    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// The number of compiled rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    async fn validate_startup(&self) -> Result<(), ConfigError> {
        let mut client = self.client.clone();
        for rule in &self.rules {
            let strict_err = |error: String| ConfigError::StrictValidation {
                model: rule.model_name.clone(),
                error,
            };

            let ready = client
                .model_ready(&rule.model_name, rule.model_version.as_deref())
                .await
                .map_err(|e| strict_err(e.to_string()))?;
            if !ready {
                return Err(strict_err("model is not ready".to_string()));
            }

            let spec = self
                .cache
                .get_spec(
                    &mut client,
                    &rule.model_name,
                    rule.model_version.as_deref(),
                    false,
                )
                .await
                .map_err(|e| strict_err(e.to_string()))?;
            self.metrics.set_metadata_available(&rule.model_name, true);
            validate_rule(rule, &spec).map_err(|e| strict_err(e.to_string()))?;
        }
        Ok(())
    }

    /// Enriches a metrics batch with the configured inference outputs and
    /// returns it, original data points intact.
    pub async fn process_metrics(&self, mut batch: MetricsData) -> MetricsData {
        if self.rules.is_empty() || batch.resource_metrics.is_empty() {
            return batch;
        }

        let emit_time = unix_nanos_now();
        for rule in &self.rules {
            match self.run_rule(rule, &mut batch, emit_time).await {
                Ok(()) => {}
                Err(err) => {
                    self.metrics
                        .record_outcome(&rule.model_name, rule.index, err.outcome());
                    warn!(
                        model = %rule.model_name,
                        rule = rule.index,
                        %err,
                        "rule skipped for this batch"
                    );
                    let strict_stop = err.is_configuration()
                        || matches!(err, RuleError::MissingInput { .. });
                    if self.strict && strict_stop {
                        error!(
                            model = %rule.model_name,
                            rule = rule.index,
                            "configuration-level failure under strict validation; \
                             remaining rules skipped for this batch"
                        );
                        break;
                    }
                }
            }
        }
        batch
    }

    async fn run_rule(
        &self,
        rule: &Rule,
        batch: &mut MetricsData,
        emit_time: u64,
    ) -> Result<(), RuleError> {
        let matched = match_rule(batch, rule)?;
        let (groups, stats) = group_points(rule, &matched);
        self.metrics.record_outcomes(
            &rule.model_name,
            rule.index,
            outcome::AMBIGUOUS_GROUP,
            stats.ambiguous as u64,
        );
        if groups.is_empty() {
            debug!(
                model = %rule.model_name,
                rule = rule.index,
                "no valid groups in this batch"
            );
            return Ok(());
        }

        let mut client = self.client.clone();
        let mut spec = match self
            .cache
            .get_spec(
                &mut client,
                &rule.model_name,
                rule.model_version.as_deref(),
                false,
            )
            .await
        {
            Ok(spec) => spec,
            Err(err) => {
                self.metrics.set_metadata_available(&rule.model_name, false);
                return Err(err);
            }
        };
        self.metrics.set_metadata_available(&rule.model_name, true);

        if let Err(first_failure) = validate_rule(rule, &spec) {
            // The cached entry may be stale; force one refresh before giving
            // up on the rule.
            debug!(
                model = %rule.model_name,
                rule = rule.index,
                err = %first_failure,
                "metadata validation failed, refreshing"
            );
            spec = self
                .cache
                .get_spec(
                    &mut client,
                    &rule.model_name,
                    rule.model_version.as_deref(),
                    true,
                )
                .await?;
            validate_rule(rule, &spec)?;
        }

        let mut emitted: Vec<Metric> = Vec::new();
        for group in &groups {
            let tensors = match encode_group(&spec, group) {
                Ok(tensors) => tensors,
                Err(err) => {
                    self.metrics.record_outcome(
                        &rule.model_name,
                        rule.index,
                        outcome::ENCODING_ERROR,
                    );
                    warn!(
                        model = %rule.model_name,
                        rule = rule.index,
                        group = %group.serialized_key,
                        %err,
                        "group skipped: tensor encoding failed"
                    );
                    continue;
                }
            };

            let request = build_request(rule, tensors);
            let started = Instant::now();
            let result = client.model_infer(request, rule.timeout).await;
            self.metrics
                .observe_request_duration(&rule.model_name, started.elapsed().as_secs_f64());

            let response = match result {
                Ok(response) => response,
                Err(err @ InferenceError::InvalidArgument { .. }) => {
                    // The server rejected our tensor shape or types: a
                    // configuration problem, not a per-group accident.
                    return Err(RuleError::Inference { source: err });
                }
                Err(err) => {
                    self.metrics
                        .record_outcome(&rule.model_name, rule.index, err.outcome());
                    warn!(
                        model = %rule.model_name,
                        rule = rule.index,
                        group = %group.serialized_key,
                        %err,
                        "group skipped: inference call failed"
                    );
                    continue;
                }
            };

            match materialize(rule, group, &response, emit_time) {
                Ok(metrics) => {
                    self.metrics
                        .record_outcome(&rule.model_name, rule.index, outcome::SUCCESS);
                    emitted.extend(metrics);
                }
                Err(err) => {
                    self.metrics.record_outcome(
                        &rule.model_name,
                        rule.index,
                        outcome::DECODING_ERROR,
                    );
                    warn!(
                        model = %rule.model_name,
                        rule = rule.index,
                        group = %group.serialized_key,
                        %err,
                        "group skipped: response decoding failed"
                    );
                }
            }
        }

        append_metrics(batch, matched.scope_path, emitted);
        Ok(())
    }
}

fn build_request(rule: &Rule, tensors: Vec<InferInputTensor>) -> ModelInferRequest {
    ModelInferRequest {
        model_name: rule.model_name.clone(),
        model_version: rule.model_version.clone().unwrap_or_default(),
        id: String::new(),
        parameters: rule
            .parameters
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        inputs: tensors,
        outputs: Vec::new(),
        raw_input_contents: Vec::new(),
    }
}

fn append_metrics(batch: &mut MetricsData, path: ScopePath, metrics: Vec<Metric>) {
    if metrics.is_empty() {
        return;
    }
    if let Some(resource) = batch.resource_metrics.get_mut(path.resource) {
        if let Some(scope) = resource.scope_metrics.get_mut(path.scope) {
            scope.metrics.extend(metrics);
        }
    }
}

fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
