// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! OTLP metrics data model: the resource → scope → metric tree.

use super::super::common::v1::{InstrumentationScope, KeyValue};
use super::super::resource::v1::Resource;

/// Top-level collection of metrics carried by a single batch.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricsData {
    /// Metrics grouped by the resource that produced them.
    #[prost(message, repeated, tag = "1")]
    pub resource_metrics: Vec<ResourceMetrics>,
}

/// Metrics produced by a single resource.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceMetrics {
    /// The resource the metrics originate from.
    #[prost(message, optional, tag = "1")]
    pub resource: Option<Resource>,
    /// Metrics grouped by instrumentation scope.
    #[prost(message, repeated, tag = "2")]
    pub scope_metrics: Vec<ScopeMetrics>,
    /// Schema URL applying to the resource.
    #[prost(string, tag = "3")]
    pub schema_url: String,
}

/// Metrics produced by a single instrumentation scope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScopeMetrics {
    /// The scope the metrics originate from.
    #[prost(message, optional, tag = "1")]
    pub scope: Option<InstrumentationScope>,
    /// The metrics themselves.
    #[prost(message, repeated, tag = "2")]
    pub metrics: Vec<Metric>,
    /// Schema URL applying to the metrics.
    #[prost(string, tag = "3")]
    pub schema_url: String,
}

/// A single named metric and its data points.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    /// Metric name, unique within a scope.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Human readable description.
    #[prost(string, tag = "2")]
    pub description: String,
    /// Unit in UCUM notation.
    #[prost(string, tag = "3")]
    pub unit: String,
    /// Additional metric-level metadata.
    #[prost(message, repeated, tag = "12")]
    pub metadata: Vec<KeyValue>,
    /// The concrete data representation.
    #[prost(oneof = "metric::Data", tags = "5, 7, 9, 10, 11")]
    pub data: Option<metric::Data>,
}

/// Nested message and enum types in `Metric`.
pub mod metric {
    /// The supported metric data kinds.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        /// Instantaneous measurements.
        #[prost(message, tag = "5")]
        Gauge(super::Gauge),
        /// Monotonic or non-monotonic sums.
        #[prost(message, tag = "7")]
        Sum(super::Sum),
        /// Bucketed histograms.
        #[prost(message, tag = "9")]
        Histogram(super::Histogram),
        /// Exponential-scale histograms.
        #[prost(message, tag = "10")]
        ExponentialHistogram(super::ExponentialHistogram),
        /// Quantile summaries.
        #[prost(message, tag = "11")]
        Summary(super::Summary),
    }
}

/// Gauge metric data: the last sampled value per stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Gauge {
    /// The sampled points.
    #[prost(message, repeated, tag = "1")]
    pub data_points: Vec<NumberDataPoint>,
}

/// Sum metric data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sum {
    /// The accumulated points.
    #[prost(message, repeated, tag = "1")]
    pub data_points: Vec<NumberDataPoint>,
    /// Whether the reported values are deltas or cumulative.
    #[prost(enumeration = "AggregationTemporality", tag = "2")]
    pub aggregation_temporality: i32,
    /// Whether the sum only ever increases.
    #[prost(bool, tag = "3")]
    pub is_monotonic: bool,
}

/// Histogram metric data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Histogram {
    /// The bucketed points.
    #[prost(message, repeated, tag = "1")]
    pub data_points: Vec<HistogramDataPoint>,
    /// Whether the reported values are deltas or cumulative.
    #[prost(enumeration = "AggregationTemporality", tag = "2")]
    pub aggregation_temporality: i32,
}

/// Exponential histogram metric data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExponentialHistogram {
    /// The bucketed points.
    #[prost(message, repeated, tag = "1")]
    pub data_points: Vec<ExponentialHistogramDataPoint>,
    /// Whether the reported values are deltas or cumulative.
    #[prost(enumeration = "AggregationTemporality", tag = "2")]
    pub aggregation_temporality: i32,
}

/// Summary metric data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Summary {
    /// The summarized points.
    #[prost(message, repeated, tag = "1")]
    pub data_points: Vec<SummaryDataPoint>,
}

/// A single int or double measurement with attributes and timestamps.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NumberDataPoint {
    /// Attributes identifying the stream this point belongs to.
    #[prost(message, repeated, tag = "7")]
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation window, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "2")]
    pub start_time_unix_nano: u64,
    /// Sampling time, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "3")]
    pub time_unix_nano: u64,
    /// Measurement exemplars.
    #[prost(message, repeated, tag = "5")]
    pub exemplars: Vec<Exemplar>,
    /// Data point flags.
    #[prost(uint32, tag = "8")]
    pub flags: u32,
    /// The measurement value.
    #[prost(oneof = "number_data_point::Value", tags = "4, 6")]
    pub value: Option<number_data_point::Value>,
}

/// Nested message and enum types in `NumberDataPoint`.
pub mod number_data_point {
    /// The numeric representations a point can carry.
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// A double precision value.
        #[prost(double, tag = "4")]
        AsDouble(f64),
        /// A 64-bit signed integer value.
        #[prost(sfixed64, tag = "6")]
        AsInt(i64),
    }
}

/// A bucketed histogram data point.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HistogramDataPoint {
    /// Attributes identifying the stream this point belongs to.
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation window, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "2")]
    pub start_time_unix_nano: u64,
    /// Sampling time, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "3")]
    pub time_unix_nano: u64,
    /// Total number of recorded values.
    #[prost(fixed64, tag = "4")]
    pub count: u64,
    /// Sum of the recorded values, if collected.
    #[prost(double, optional, tag = "5")]
    pub sum: Option<f64>,
    /// Per-bucket counts; one longer than `explicit_bounds`.
    #[prost(fixed64, repeated, tag = "6")]
    pub bucket_counts: Vec<u64>,
    /// Upper bucket boundaries.
    #[prost(double, repeated, tag = "7")]
    pub explicit_bounds: Vec<f64>,
    /// Measurement exemplars.
    #[prost(message, repeated, tag = "8")]
    pub exemplars: Vec<Exemplar>,
    /// Data point flags.
    #[prost(uint32, tag = "10")]
    pub flags: u32,
    /// Minimum recorded value, if collected.
    #[prost(double, optional, tag = "11")]
    pub min: Option<f64>,
    /// Maximum recorded value, if collected.
    #[prost(double, optional, tag = "12")]
    pub max: Option<f64>,
}

/// An exponential-scale histogram data point.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExponentialHistogramDataPoint {
    /// Attributes identifying the stream this point belongs to.
    #[prost(message, repeated, tag = "1")]
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation window, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "2")]
    pub start_time_unix_nano: u64,
    /// Sampling time, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "3")]
    pub time_unix_nano: u64,
    /// Total number of recorded values.
    #[prost(fixed64, tag = "4")]
    pub count: u64,
    /// Sum of the recorded values, if collected.
    #[prost(double, optional, tag = "5")]
    pub sum: Option<f64>,
    /// Resolution of the buckets.
    #[prost(sint32, tag = "6")]
    pub scale: i32,
    /// Count of values exactly at zero.
    #[prost(fixed64, tag = "7")]
    pub zero_count: u64,
    /// Buckets for positive values.
    #[prost(message, optional, tag = "8")]
    pub positive: Option<exponential_histogram_data_point::Buckets>,
    /// Buckets for negative values.
    #[prost(message, optional, tag = "9")]
    pub negative: Option<exponential_histogram_data_point::Buckets>,
    /// Data point flags.
    #[prost(uint32, tag = "10")]
    pub flags: u32,
    /// Measurement exemplars.
    #[prost(message, repeated, tag = "11")]
    pub exemplars: Vec<Exemplar>,
    /// Minimum recorded value, if collected.
    #[prost(double, optional, tag = "12")]
    pub min: Option<f64>,
    /// Maximum recorded value, if collected.
    #[prost(double, optional, tag = "13")]
    pub max: Option<f64>,
}

/// Nested message and enum types in `ExponentialHistogramDataPoint`.
pub mod exponential_histogram_data_point {
    /// A contiguous run of exponential buckets.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Buckets {
        /// Index of the first bucket in `bucket_counts`.
        #[prost(sint32, tag = "1")]
        pub offset: i32,
        /// Per-bucket counts starting at `offset`.
        #[prost(uint64, repeated, tag = "2")]
        pub bucket_counts: Vec<u64>,
    }
}

/// A quantile summary data point.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SummaryDataPoint {
    /// Attributes identifying the stream this point belongs to.
    #[prost(message, repeated, tag = "7")]
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation window, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "2")]
    pub start_time_unix_nano: u64,
    /// Sampling time, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "3")]
    pub time_unix_nano: u64,
    /// Total number of recorded values.
    #[prost(fixed64, tag = "4")]
    pub count: u64,
    /// Sum of the recorded values.
    #[prost(double, tag = "5")]
    pub sum: f64,
    /// Values at the tracked quantiles.
    #[prost(message, repeated, tag = "6")]
    pub quantile_values: Vec<summary_data_point::ValueAtQuantile>,
    /// Data point flags.
    #[prost(uint32, tag = "8")]
    pub flags: u32,
}

/// Nested message and enum types in `SummaryDataPoint`.
pub mod summary_data_point {
    /// A single quantile/value pair.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct ValueAtQuantile {
        /// The quantile, in [0, 1].
        #[prost(double, tag = "1")]
        pub quantile: f64,
        /// The value at that quantile.
        #[prost(double, tag = "2")]
        pub value: f64,
    }
}

/// An example measurement linked from an aggregated point.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Exemplar {
    /// Attributes recorded with the measurement but dropped from the point.
    #[prost(message, repeated, tag = "7")]
    pub filtered_attributes: Vec<KeyValue>,
    /// Measurement time, in nanoseconds since the Unix epoch.
    #[prost(fixed64, tag = "2")]
    pub time_unix_nano: u64,
    /// Span id of the recording span, if any.
    #[prost(bytes = "vec", tag = "4")]
    pub span_id: Vec<u8>,
    /// Trace id of the recording span, if any.
    #[prost(bytes = "vec", tag = "5")]
    pub trace_id: Vec<u8>,
    /// The measured value.
    #[prost(oneof = "exemplar::Value", tags = "3, 6")]
    pub value: Option<exemplar::Value>,
}

/// Nested message and enum types in `Exemplar`.
pub mod exemplar {
    /// The numeric representations an exemplar can carry.
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// A double precision value.
        #[prost(double, tag = "3")]
        AsDouble(f64),
        /// A 64-bit signed integer value.
        #[prost(sfixed64, tag = "6")]
        AsInt(i64),
    }
}

/// Temporality of reported aggregate values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AggregationTemporality {
    /// Temporality was not specified.
    Unspecified = 0,
    /// Values cover only the window since the previous report.
    Delta = 1,
    /// Values accumulate since a fixed start time.
    Cumulative = 2,
}
