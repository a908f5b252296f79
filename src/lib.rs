// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! # Metrics Inference Processor
//!
//! A pipeline processor that intercepts OTLP metric batches in flight,
//! enriches them with outputs produced by a remote KServe v2 inference
//! server, and re-emits the augmented batch downstream.
//!
//! The processor is declarative: operators configure *rules* binding named
//! input metrics to a remote model and to one or more output metric names.
//! Per batch, each rule selects its input data points, correlates them into
//! attribute-keyed groups, encodes one set of request tensors per group,
//! invokes `ModelInfer`, and materializes the response tensors as new gauge
//! metrics appended to the same batch.
//!
//! The processor is strictly additive: original data points are always
//! forwarded unchanged, and no rule failure ever propagates to the host
//! pipeline.
//!
//! ```no_run
//! use metrics_inference_processor::{Config, InferenceProcessor};
//! use metrics_inference_processor::pdata::opentelemetry::metrics::v1::MetricsData;
//!
//! # async fn run(batch: MetricsData) -> Result<(), Box<dyn std::error::Error>> {
//! let config: Config = serde_json::from_value(serde_json::json!({
//!     "grpc": { "endpoint": "http://inference-server:8001" },
//!     "timeout": 5,
//!     "rules": [{
//!         "model_name": "cpu_prediction",
//!         "inputs": ["system.cpu.utilization"],
//!         "outputs": [{ "name": "prediction", "data_type": "double" }],
//!     }],
//! }))?;
//! let processor = InferenceProcessor::new(config).await?;
//! let augmented = processor.process_metrics(batch).await;
//! # drop(augmented);
//! # Ok(())
//! # }
//! ```

/// KServe v2 gRPC client and per-method codec.
pub mod client;
/// Configuration surface and rule compiler.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Model metadata cache and compatibility checks.
pub mod metadata;
/// Observability instruments.
pub mod metrics;
/// Heuristic output naming.
pub mod naming;
/// Output-name templates.
pub mod pattern;
/// Vendored OTLP metrics data model.
pub mod pdata;
/// The processor orchestrator.
pub mod processor;
/// Vendored KServe v2 protocol definitions.
pub mod proto;
/// Input selector parsing and matching.
pub mod selector;

mod decode;
mod encode;
mod matcher;

/// Mock inference service for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::Config;
pub use decode::MODEL_NAME_ATTRIBUTE;
pub use error::ConfigError;
pub use processor::InferenceProcessor;
