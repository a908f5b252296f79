// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Message types of the KServe v2 `inference.GRPCInferenceService` service.

use std::collections::HashMap;

/// Request for the server liveness probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerLiveRequest {}

/// Response of the server liveness probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerLiveResponse {
    /// True if the inference server is able to respond to requests.
    #[prost(bool, tag = "1")]
    pub live: bool,
}

/// Request for the server readiness probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerReadyRequest {}

/// Response of the server readiness probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerReadyResponse {
    /// True if the server is ready to accept inference requests.
    #[prost(bool, tag = "1")]
    pub ready: bool,
}

/// Request for the per-model readiness probe.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelReadyRequest {
    /// Name of the model to check.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Version of the model to check. Empty selects a server-chosen version.
    #[prost(string, tag = "2")]
    pub version: String,
}

/// Response of the per-model readiness probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ModelReadyResponse {
    /// True if the model is loaded and ready for inference.
    #[prost(bool, tag = "1")]
    pub ready: bool,
}

/// Request for model metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelMetadataRequest {
    /// Name of the model.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Version of the model. Empty selects a server-chosen version.
    #[prost(string, tag = "2")]
    pub version: String,
}

/// Model metadata: platform plus ordered input/output tensor specs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelMetadataResponse {
    /// Model name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Versions of the model available on the server.
    #[prost(string, repeated, tag = "2")]
    pub versions: Vec<String>,
    /// Framework/backend identifier.
    #[prost(string, tag = "3")]
    pub platform: String,
    /// Ordered input tensor specifications.
    #[prost(message, repeated, tag = "4")]
    pub inputs: Vec<model_metadata_response::TensorMetadata>,
    /// Ordered output tensor specifications.
    #[prost(message, repeated, tag = "5")]
    pub outputs: Vec<model_metadata_response::TensorMetadata>,
}

/// Nested message and enum types in `ModelMetadataResponse`.
pub mod model_metadata_response {
    /// Metadata for a single input or output tensor.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorMetadata {
        /// Tensor name.
        #[prost(string, tag = "1")]
        pub name: String,
        /// Tensor datatype in KServe nomenclature, e.g. `FP64` or `INT64`.
        #[prost(string, tag = "2")]
        pub datatype: String,
        /// Tensor shape; -1 denotes a dynamic dimension.
        #[prost(int64, repeated, tag = "3")]
        pub shape: Vec<i64>,
    }
}

/// A scalar parameter value forwarded to the model.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferParameter {
    /// The concrete parameter value.
    #[prost(oneof = "infer_parameter::ParameterChoice", tags = "1, 2, 3, 4")]
    pub parameter_choice: Option<infer_parameter::ParameterChoice>,
}

/// Nested message and enum types in `InferParameter`.
pub mod infer_parameter {
    /// The scalar types a parameter can carry.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ParameterChoice {
        /// A boolean parameter.
        #[prost(bool, tag = "1")]
        BoolParam(bool),
        /// A 64-bit integer parameter.
        #[prost(int64, tag = "2")]
        Int64Param(i64),
        /// A string parameter.
        #[prost(string, tag = "3")]
        StringParam(String),
        /// A double precision parameter.
        #[prost(double, tag = "4")]
        DoubleParam(f64),
    }
}

/// Typed tensor payload carried inline in a request or response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferTensorContents {
    /// Elements of a `BOOL` tensor.
    #[prost(bool, repeated, tag = "1")]
    pub bool_contents: Vec<bool>,
    /// Elements of an `INT8`/`INT16`/`INT32` tensor.
    #[prost(int32, repeated, tag = "2")]
    pub int_contents: Vec<i32>,
    /// Elements of an `INT64` tensor.
    #[prost(int64, repeated, tag = "3")]
    pub int64_contents: Vec<i64>,
    /// Elements of a `UINT8`/`UINT16`/`UINT32` tensor.
    #[prost(uint32, repeated, tag = "4")]
    pub uint_contents: Vec<u32>,
    /// Elements of a `UINT64` tensor.
    #[prost(uint64, repeated, tag = "5")]
    pub uint64_contents: Vec<u64>,
    /// Elements of an `FP32` tensor.
    #[prost(float, repeated, tag = "6")]
    pub fp32_contents: Vec<f32>,
    /// Elements of an `FP64` tensor.
    #[prost(double, repeated, tag = "7")]
    pub fp64_contents: Vec<f64>,
    /// Elements of a `BYTES` tensor.
    #[prost(bytes = "vec", repeated, tag = "8")]
    pub bytes_contents: Vec<Vec<u8>>,
}

/// Request for a single inference execution.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferRequest {
    /// Name of the model to run.
    #[prost(string, tag = "1")]
    pub model_name: String,
    /// Version of the model to run. Empty selects a server-chosen version.
    #[prost(string, tag = "2")]
    pub model_version: String,
    /// Optional correlation id echoed back in the response.
    #[prost(string, tag = "3")]
    pub id: String,
    /// Opaque parameters forwarded to the model.
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    /// Input tensors, in the order declared by the model metadata.
    #[prost(message, repeated, tag = "5")]
    pub inputs: Vec<model_infer_request::InferInputTensor>,
    /// Outputs requested from the model; empty requests all outputs.
    #[prost(message, repeated, tag = "6")]
    pub outputs: Vec<model_infer_request::InferRequestedOutputTensor>,
    /// Raw little-endian tensor payloads, one per input, as an alternative
    /// to the typed contents.
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub raw_input_contents: Vec<Vec<u8>>,
}

/// Nested message and enum types in `ModelInferRequest`.
pub mod model_infer_request {
    use super::{InferParameter, InferTensorContents};
    use std::collections::HashMap;

    /// A single input tensor of an inference request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InferInputTensor {
        /// Tensor name, matching the model metadata.
        #[prost(string, tag = "1")]
        pub name: String,
        /// Tensor datatype in KServe nomenclature.
        #[prost(string, tag = "2")]
        pub datatype: String,
        /// Concrete tensor shape; all dimensions resolved.
        #[prost(int64, repeated, tag = "3")]
        pub shape: Vec<i64>,
        /// Per-tensor parameters.
        #[prost(map = "string, message", tag = "4")]
        pub parameters: HashMap<String, InferParameter>,
        /// The tensor payload.
        #[prost(message, optional, tag = "5")]
        pub contents: Option<InferTensorContents>,
    }

    /// A requested output tensor of an inference request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InferRequestedOutputTensor {
        /// Tensor name, matching the model metadata.
        #[prost(string, tag = "1")]
        pub name: String,
        /// Per-tensor parameters.
        #[prost(map = "string, message", tag = "2")]
        pub parameters: HashMap<String, InferParameter>,
    }
}

/// Response of a single inference execution.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferResponse {
    /// Name of the model that ran.
    #[prost(string, tag = "1")]
    pub model_name: String,
    /// Version of the model that ran.
    #[prost(string, tag = "2")]
    pub model_version: String,
    /// Correlation id from the request.
    #[prost(string, tag = "3")]
    pub id: String,
    /// Opaque response parameters.
    #[prost(map = "string, message", tag = "4")]
    pub parameters: HashMap<String, InferParameter>,
    /// Output tensors, in the model's declared order.
    #[prost(message, repeated, tag = "5")]
    pub outputs: Vec<model_infer_response::InferOutputTensor>,
    /// Raw little-endian tensor payloads, one per output, as an alternative
    /// to the typed contents.
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub raw_output_contents: Vec<Vec<u8>>,
}

/// Nested message and enum types in `ModelInferResponse`.
pub mod model_infer_response {
    use super::{InferParameter, InferTensorContents};
    use std::collections::HashMap;

    /// A single output tensor of an inference response.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InferOutputTensor {
        /// Tensor name.
        #[prost(string, tag = "1")]
        pub name: String,
        /// Tensor datatype in KServe nomenclature.
        #[prost(string, tag = "2")]
        pub datatype: String,
        /// Concrete tensor shape.
        #[prost(int64, repeated, tag = "3")]
        pub shape: Vec<i64>,
        /// Per-tensor parameters.
        #[prost(map = "string, message", tag = "4")]
        pub parameters: HashMap<String, InferParameter>,
        /// The tensor payload.
        #[prost(message, optional, tag = "5")]
        pub contents: Option<InferTensorContents>,
    }
}
