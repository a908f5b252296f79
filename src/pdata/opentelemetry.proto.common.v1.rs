// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Common value types shared by all OTLP signals.

/// A value that can hold any of the supported OTLP attribute value types.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnyValue {
    /// The concrete value, if set. An empty `AnyValue` represents the absence
    /// of a value.
    #[prost(oneof = "any_value::Value", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub value: Option<any_value::Value>,
}

/// Nested message and enum types in `AnyValue`.
pub mod any_value {
    /// The set of value types an attribute can carry.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// A UTF-8 string value.
        #[prost(string, tag = "1")]
        StringValue(String),
        /// A boolean value.
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        /// A 64-bit signed integer value.
        #[prost(int64, tag = "3")]
        IntValue(i64),
        /// A double precision floating point value.
        #[prost(double, tag = "4")]
        DoubleValue(f64),
        /// An ordered collection of values.
        #[prost(message, tag = "5")]
        ArrayValue(super::ArrayValue),
        /// A keyed collection of values.
        #[prost(message, tag = "6")]
        KvlistValue(super::KeyValueList),
        /// An opaque byte array.
        #[prost(bytes = "vec", tag = "7")]
        BytesValue(Vec<u8>),
    }
}

/// An ordered list of [`AnyValue`]s.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrayValue {
    /// The array elements, in order.
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<AnyValue>,
}

/// A list of key-value pairs that preserves insertion order and allows
/// duplicate keys.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValueList {
    /// The contained pairs, in order.
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<KeyValue>,
}

/// A key-value pair used for attributes on any OTLP entity.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    /// The attribute key.
    #[prost(string, tag = "1")]
    pub key: String,
    /// The attribute value.
    #[prost(message, optional, tag = "2")]
    pub value: Option<AnyValue>,
}

/// The instrumentation scope that produced a piece of telemetry.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstrumentationScope {
    /// Scope name, typically the instrumentation library name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Scope version.
    #[prost(string, tag = "2")]
    pub version: String,
    /// Additional scope attributes.
    #[prost(message, repeated, tag = "3")]
    pub attributes: Vec<KeyValue>,
    /// Number of attributes dropped due to collection limits.
    #[prost(uint32, tag = "4")]
    pub dropped_attributes_count: u32,
}
