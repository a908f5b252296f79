// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end processor tests against an in-process mock inference server.

use metrics_inference_processor::mock::{
    MockInferenceService, MockModel, fp32_output, fp64_output, int64_output,
};
use metrics_inference_processor::pdata::opentelemetry::common::v1::{
    AnyValue, KeyValue, any_value::Value,
};
use metrics_inference_processor::pdata::opentelemetry::metrics::v1::{
    Gauge, Metric, MetricsData, NumberDataPoint, ResourceMetrics, ScopeMetrics, metric::Data,
    number_data_point::Value as NumberValue,
};
use metrics_inference_processor::{Config, InferenceProcessor, MODEL_NAME_ATTRIBUTE};
use std::net::SocketAddr;
use std::time::Duration;

fn attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

fn gauge_point(value: f64, attrs: Vec<KeyValue>) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attrs,
        start_time_unix_nano: 0,
        time_unix_nano: 1_000,
        exemplars: vec![],
        flags: 0,
        value: Some(NumberValue::AsDouble(value)),
    }
}

fn gauge_metric(name: &str, points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        description: String::new(),
        unit: String::new(),
        metadata: vec![],
        data: Some(Data::Gauge(Gauge {
            data_points: points,
        })),
    }
}

fn batch(metrics: Vec<Metric>) -> MetricsData {
    MetricsData {
        resource_metrics: vec![ResourceMetrics {
            resource: None,
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }],
    }
}

fn config(addr: SocketAddr, rules: serde_json::Value) -> Config {
    serde_json::from_value(serde_json::json!({
        "grpc": { "endpoint": format!("http://{addr}") },
        "timeout": 5,
        "rules": rules,
    }))
    .expect("valid config")
}

fn metrics_of(batch: &MetricsData) -> Vec<&Metric> {
    batch
        .resource_metrics
        .iter()
        .flat_map(|r| r.scope_metrics.iter())
        .flat_map(|s| s.metrics.iter())
        .collect()
}

fn find_metric<'a>(batch: &'a MetricsData, name: &str) -> Option<&'a Metric> {
    metrics_of(batch).into_iter().find(|m| m.name == name)
}

fn gauge_points(metric: &Metric) -> &[NumberDataPoint] {
    match metric.data.as_ref() {
        Some(Data::Gauge(gauge)) => &gauge.data_points,
        _ => panic!("expected gauge data on `{}`", metric.name),
    }
}

fn attr_value<'a>(point: &'a NumberDataPoint, key: &str) -> Option<&'a str> {
    point
        .attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| v.value.as_ref())
        .and_then(|v| match v {
            Value::StringValue(s) => Some(s.as_str()),
            _ => None,
        })
}

fn rendered_operations(processor: &InferenceProcessor) -> String {
    let registry = prometheus_registry(processor);
    prometheus_render(&registry)
}

fn prometheus_registry(processor: &InferenceProcessor) -> prometheus::Registry {
    let registry = prometheus::Registry::new();
    processor
        .metrics()
        .register_on(&registry)
        .expect("register metrics");
    registry
}

fn prometheus_render(registry: &prometheus::Registry) -> String {
    prometheus::TextEncoder::new()
        .encode_to_string(&registry.gather())
        .expect("encode metrics")
}

#[tokio::test]
async fn basic_scalar_prediction() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("cpu_prediction")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP32", vec![1])
            .respond_with(vec![fp32_output("OUTPUT__0", vec![0.85])]),
    ]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "cpu_prediction",
            "inputs": ["system.cpu.utilization"],
            "output_pattern": "{output}",
            "outputs": [{ "name": "system_cpu.predicted", "data_type": "float" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0"), attr("state", "user")])],
    )]);
    let out = processor.process_metrics(input).await;

    // The original metric is preserved verbatim.
    let original = find_metric(&out, "system.cpu.utilization").expect("original metric");
    assert_eq!(gauge_points(original).len(), 1);

    let emitted = find_metric(&out, "system_cpu.predicted").expect("emitted metric");
    assert_eq!(
        emitted.description,
        "Inference result from model cpu_prediction"
    );
    let points = gauge_points(emitted);
    assert_eq!(points.len(), 1);
    let Some(NumberValue::AsDouble(value)) = points[0].value else {
        panic!("expected double value");
    };
    assert!((value - 0.85).abs() < 1e-6);

    assert_eq!(
        attr_value(&points[0], MODEL_NAME_ATTRIBUTE),
        Some("cpu_prediction")
    );
    assert_eq!(
        attr_value(&points[0], "system.cpu.utilization.cpu"),
        Some("0")
    );
    assert_eq!(
        attr_value(&points[0], "system.cpu.utilization.state"),
        Some("user")
    );

    // Exactly one inference call carrying the encoded scalar tensor.
    let requests = mock.received();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model_name, "cpu_prediction");
    assert_eq!(requests[0].inputs.len(), 1);
    assert_eq!(requests[0].inputs[0].datatype, "FP64");
    assert_eq!(requests[0].inputs[0].shape, vec![1]);
    assert_eq!(
        requests[0].inputs[0]
            .contents
            .as_ref()
            .expect("tensor contents")
            .fp64_contents,
        vec![0.75]
    );
}

#[tokio::test]
async fn mixed_output_types_propagate_all_input_attributes() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("resource_model")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_input("INPUT__1", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP32", vec![1])
            .with_output("OUTPUT__1", "INT64", vec![1])
            .with_output("OUTPUT__2", "FP64", vec![1])
            .respond_with(vec![
                fp32_output("OUTPUT__0", vec![0.15]),
                int64_output("OUTPUT__1", vec![1]),
                fp64_output("OUTPUT__2", vec![0.95]),
            ]),
    ]);
    let (addr, _server) = mock.serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "resource_model",
            "inputs": ["system.cpu.utilization", "system.memory.utilization"],
            "outputs": [
                { "name": "scaled", "data_type": "float", "output_index": 0 },
                { "name": "class", "data_type": "int", "output_index": 1 },
                { "name": "confidence", "data_type": "double", "output_index": 2 },
            ],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![
        gauge_metric(
            "system.cpu.utilization",
            vec![gauge_point(0.75, vec![attr("host", "a")])],
        ),
        gauge_metric(
            "system.memory.utilization",
            vec![gauge_point(0.45, vec![attr("host", "a")])],
        ),
    ]);
    let out = processor.process_metrics(input).await;

    let scaled = find_metric(&out, "cpu_utilization_memory_utilization.scaled")
        .expect("float output");
    let class = find_metric(&out, "cpu_utilization_memory_utilization.class")
        .expect("int output");
    let confidence = find_metric(&out, "cpu_utilization_memory_utilization.confidence")
        .expect("double output");

    assert!(matches!(
        gauge_points(class)[0].value,
        Some(NumberValue::AsInt(1))
    ));
    let Some(NumberValue::AsDouble(value)) = gauge_points(confidence)[0].value else {
        panic!("expected double value");
    };
    assert!((value - 0.95).abs() < 1e-9);

    // Group-key attributes arrive once per contributing input, prefixed.
    let point = &gauge_points(scaled)[0];
    assert_eq!(
        attr_value(point, "system.cpu.utilization.host"),
        Some("a")
    );
    assert_eq!(
        attr_value(point, "system.memory.utilization.host"),
        Some("a")
    );
}

#[tokio::test]
async fn multi_attribute_grouping_calls_per_group() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("fs_model")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_input("INPUT__1", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![0.5])]),
    ]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "fs_model",
            "inputs": ["system.filesystem.usage", "system.filesystem.utilization"],
            "outputs": [{ "name": "forecast", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![
        gauge_metric(
            "system.filesystem.usage",
            vec![
                gauge_point(100.0, vec![attr("device", "/dev/sda1")]),
                gauge_point(200.0, vec![attr("device", "/dev/sda2")]),
            ],
        ),
        gauge_metric(
            "system.filesystem.utilization",
            vec![
                gauge_point(0.1, vec![attr("device", "/dev/sda1")]),
                gauge_point(0.2, vec![attr("device", "/dev/sda2")]),
            ],
        ),
    ]);
    let out = processor.process_metrics(input).await;

    // One inference call per group, in deterministic group order.
    let requests = mock.received();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].inputs[0]
            .contents
            .as_ref()
            .expect("tensor contents")
            .fp64_contents,
        vec![100.0]
    );
    assert_eq!(
        requests[1].inputs[0]
            .contents
            .as_ref()
            .expect("tensor contents")
            .fp64_contents,
        vec![200.0]
    );

    // One emitted metric per group x output, one data point each.
    let emitted: Vec<&Metric> = metrics_of(&out)
        .into_iter()
        .filter(|m| m.name == "filesystem_usage_filesystem_utilization.forecast")
        .collect();
    assert_eq!(emitted.len(), 2);
    let devices: Vec<Option<&str>> = emitted
        .iter()
        .map(|m| attr_value(&gauge_points(m)[0], "system.filesystem.usage.device"))
        .collect();
    assert_eq!(devices, vec![Some("/dev/sda1"), Some("/dev/sda2")]);
}

#[tokio::test]
async fn intelligent_naming_without_pattern() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("cpu_prediction")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![0.6])]),
    ]);
    let (addr, _server) = mock.serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "cpu_prediction",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0")])],
    )]);
    let out = processor.process_metrics(input).await;
    assert!(find_metric(&out, "cpu_utilization.prediction").is_some());
}

#[tokio::test]
async fn server_error_forwards_batch_intact() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("failing_model")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .fail_with(tonic::Code::Internal, "model exploded"),
    ]);
    let (addr, _server) = mock.serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "failing_model",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0")])],
    )]);
    let out = processor.process_metrics(input.clone()).await;

    assert_eq!(out, input);
    let rendered = rendered_operations(&processor);
    assert!(rendered.contains("outcome=\"internal_error\""));
}

#[tokio::test]
async fn timeout_skips_rule_and_forwards_batch() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("slow_model")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .delay_with(
                Duration::from_secs(5),
                vec![fp64_output("OUTPUT__0", vec![0.5])],
            ),
    ]);
    let (addr, _server) = mock.serve().await;

    let mut config = config(
        addr,
        serde_json::json!([{
            "model_name": "slow_model",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]),
    );
    config.timeout = Duration::from_millis(100);

    let processor = InferenceProcessor::new(config).await.expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0")])],
    )]);
    let started = std::time::Instant::now();
    let out = processor.process_metrics(input.clone()).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(out, input);
    let rendered = rendered_operations(&processor);
    assert!(rendered.contains("outcome=\"timeout\""));
}

#[tokio::test]
async fn empty_batch_is_identity() {
    let mock = MockInferenceService::new(vec![]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [{ "name": "p", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let out = processor
        .process_metrics(MetricsData {
            resource_metrics: vec![],
        })
        .await;
    assert!(out.resource_metrics.is_empty());
    assert!(mock.received().is_empty());
}

#[tokio::test]
async fn input_with_zero_points_skips_rule() {
    let mock = MockInferenceService::new(vec![]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "m",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "p", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric("system.cpu.utilization", vec![])]);
    let out = processor.process_metrics(input.clone()).await;
    assert_eq!(out, input);
    assert!(mock.received().is_empty());
}

#[tokio::test]
async fn identical_batches_produce_identical_emitted_names() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("cpu_prediction")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![0.6])]),
    ]);
    let (addr, _server) = mock.serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "cpu_prediction",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0")])],
    )]);

    let first = processor.process_metrics(input.clone()).await;
    let second = processor.process_metrics(input).await;

    let names = |md: &MetricsData| -> Vec<String> {
        metrics_of(md).iter().map(|m| m.name.clone()).collect()
    };
    assert_eq!(names(&first), names(&second));
}

#[tokio::test]
async fn strict_validation_rejects_mismatched_rule_at_startup() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("m")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1]),
    ]);
    let (addr, _server) = mock.serve().await;

    let mut cfg = config(
        addr,
        serde_json::json!([{
            "model_name": "m",
            // Two configured inputs against a one-input model.
            "inputs": ["a", "b"],
            "outputs": [{ "name": "p", "data_type": "double" }],
        }]),
    );
    cfg.strict_validation = true;

    let result = InferenceProcessor::new(cfg).await;
    assert!(matches!(
        result,
        Err(metrics_inference_processor::ConfigError::StrictValidation { .. })
    ));
}

#[tokio::test]
async fn strict_validation_accepts_matching_rule() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("m")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![1.0])]),
    ]);
    let (addr, _server) = mock.serve().await;

    let mut cfg = config(
        addr,
        serde_json::json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [{ "name": "p", "data_type": "double" }],
        }]),
    );
    cfg.strict_validation = true;

    assert!(InferenceProcessor::new(cfg).await.is_ok());
}

#[tokio::test]
async fn model_metadata_is_fetched_once_across_batches() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("cached_model")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![0.5])]),
    ]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "cached_model",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric(
        "system.cpu.utilization",
        vec![gauge_point(0.75, vec![attr("cpu", "0")])],
    )]);
    let _ = processor.process_metrics(input.clone()).await;
    let _ = processor.process_metrics(input).await;

    assert_eq!(mock.received().len(), 2);
    assert_eq!(mock.metadata_received().len(), 1);
}

#[tokio::test]
async fn parameters_are_forwarded_with_every_request() {
    let mock = MockInferenceService::new(vec![
        MockModel::new("m")
            .with_input("INPUT__0", "FP64", vec![1])
            .with_output("OUTPUT__0", "FP64", vec![1])
            .respond_with(vec![fp64_output("OUTPUT__0", vec![1.0])]),
    ]);
    let (addr, _server) = mock.clone().serve().await;

    let processor = InferenceProcessor::new(config(
        addr,
        serde_json::json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [{ "name": "p", "data_type": "double" }],
            "parameters": { "window": 3, "mode": "fast" },
        }]),
    ))
    .await
    .expect("build processor");

    let input = batch(vec![gauge_metric("a", vec![gauge_point(1.0, vec![])])]);
    let _ = processor.process_metrics(input).await;

    let requests = mock.received();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].parameters.contains_key("window"));
    assert!(requests[0].parameters.contains_key("mode"));
}
