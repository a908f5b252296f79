// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy of the inference processor.
//!
//! Startup problems surface as [`ConfigError`] and are fatal. Everything that
//! can go wrong while a batch is in flight is a [`RuleError`]; those are
//! logged and counted but never propagate to the host pipeline.

use std::time::Duration;
use thiserror::Error;

/// Fatal configuration errors raised while compiling rules at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A rule is structurally invalid.
    #[error("rule {rule_index}: {error}")]
    InvalidRule {
        /// Index of the offending rule in the configured rule list.
        rule_index: usize,
        /// Description of the problem.
        error: String,
    },

    /// A rule input selector failed to parse.
    #[error("rule {rule_index}: invalid selector `{selector}`: {source}")]
    InvalidSelector {
        /// Index of the offending rule in the configured rule list.
        rule_index: usize,
        /// The selector text as configured.
        selector: String,
        /// The parse failure.
        source: SelectorError,
    },

    /// A rule output pattern failed to parse.
    #[error("rule {rule_index}: invalid output pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// Index of the offending rule in the configured rule list.
        rule_index: usize,
        /// The pattern text as configured.
        pattern: String,
        /// The parse failure.
        source: PatternError,
    },

    /// Two outputs resolve to the same emitted metric name.
    #[error("rule {rule_index}: duplicate output metric name `{name}`")]
    DuplicateOutputName {
        /// Index of the rule declaring the second occurrence.
        rule_index: usize,
        /// The colliding metric name after pattern expansion.
        name: String,
    },

    /// The gRPC endpoint could not be turned into a transport endpoint.
    #[error("invalid grpc endpoint `{endpoint}`: {error}")]
    InvalidEndpoint {
        /// The configured endpoint.
        endpoint: String,
        /// The transport-level failure.
        error: String,
    },

    /// A configured header is not valid gRPC ASCII metadata.
    #[error("invalid grpc header `{name}`: {error}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Description of the problem.
        error: String,
    },

    /// Strict validation rejected the configuration against live metadata.
    #[error("strict validation failed for model `{model}`: {error}")]
    StrictValidation {
        /// The model whose metadata disagrees with the configuration.
        model: String,
        /// Description of the mismatch.
        error: String,
    },

    /// The observability instruments could not be created.
    #[error("failed to build observability metrics: {error}")]
    Observability {
        /// The underlying registry failure.
        error: String,
    },
}

/// Parse errors for `metric{key="value"}` selectors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// Braces are missing, unbalanced, or followed by trailing input.
    #[error("unbalanced braces")]
    UnbalancedBraces,

    /// The metric name before the label block is empty.
    #[error("empty metric name")]
    EmptyMetricName,

    /// A label pair has no `=` separator.
    #[error("label pair `{pair}` is missing `=`")]
    MissingEquals {
        /// The offending pair text.
        pair: String,
    },

    /// A label pair has an empty key.
    #[error("label pair `{pair}` has an empty key")]
    EmptyKey {
        /// The offending pair text.
        pair: String,
    },

    /// A label value is not wrapped in double quotes.
    #[error("label value in `{pair}` must be double-quoted")]
    UnquotedValue {
        /// The offending pair text.
        pair: String,
    },
}

/// Parse errors for output-name patterns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// A `{` has no matching `}` or vice versa.
    #[error("unbalanced braces")]
    UnbalancedBraces,

    /// A placeholder is not one of `{model}`, `{version}`, `{output}`,
    /// `{input}` or `{input[N]}`.
    #[error("unknown placeholder `{{{placeholder}}}`")]
    UnknownPlaceholder {
        /// The unrecognized placeholder body.
        placeholder: String,
    },

    /// An `{input[N]}` index is not a non-negative integer.
    #[error("invalid input index in `{{{placeholder}}}`")]
    InvalidIndex {
        /// The offending placeholder body.
        placeholder: String,
    },
}

/// Per-batch failures of a single rule. Never propagated to the pipeline.
#[derive(Debug, Error)]
pub enum RuleError {
    /// An input selector matched no data points in the batch.
    #[error("no data points match input selector `{selector}`")]
    MissingInput {
        /// The selector with no matches.
        selector: String,
    },

    /// Model metadata could not be fetched.
    #[error("model metadata unavailable: {source}")]
    Metadata {
        /// The underlying RPC failure.
        source: InferenceError,
    },

    /// Model metadata could not be interpreted.
    #[error("invalid model metadata: {error}")]
    InvalidMetadata {
        /// Description of the problem.
        error: String,
    },

    /// The rule disagrees with the model's tensor specs.
    #[error("rule is incompatible with model metadata: {error}")]
    Incompatible {
        /// Description of the mismatch.
        error: String,
    },

    /// The inference call was rejected as a bad request.
    #[error("inference call failed: {source}")]
    Inference {
        /// The classified RPC failure.
        source: InferenceError,
    },
}

impl RuleError {
    /// Outcome label recorded for this failure.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            RuleError::MissingInput { .. } => outcome::MISSING_INPUT,
            RuleError::Metadata { .. } => outcome::METADATA_ERROR,
            RuleError::InvalidMetadata { .. } => outcome::METADATA_ERROR,
            RuleError::Incompatible { .. } => outcome::INCOMPATIBLE,
            RuleError::Inference { source } => source.outcome(),
        }
    }

    /// True when the failure indicates a configuration problem rather than a
    /// transient runtime condition.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            RuleError::Incompatible { .. } => true,
            RuleError::Inference { source } => {
                matches!(source, InferenceError::InvalidArgument { .. })
            }
            _ => false,
        }
    }
}

/// Tensor construction failures for a single group.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The model declares a tensor datatype the processor cannot feed.
    #[error("input `{input}`: cannot encode {from} points into {to} tensor")]
    Narrowing {
        /// Name of the tensor per the model metadata.
        input: String,
        /// The datatype inferred from the selected points.
        from: &'static str,
        /// The datatype declared by the model.
        to: String,
    },

    /// The group's point count does not fit the declared tensor shape.
    #[error("input `{input}`: {points} point(s) do not fit shape {shape:?}")]
    ShapeMismatch {
        /// Name of the tensor per the model metadata.
        input: String,
        /// The shape declared by the model.
        shape: Vec<i64>,
        /// Number of points in the group.
        points: usize,
    },

    /// The declared shape has more than one dynamic dimension.
    #[error("input `{input}`: shape {shape:?} cannot be resolved")]
    UnresolvedShape {
        /// Name of the tensor per the model metadata.
        input: String,
        /// The shape declared by the model.
        shape: Vec<i64>,
    },
}

/// Response-tensor interpretation failures for a single group.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The response carries no tensor at the expected index.
    #[error("output `{output}`: response has no tensor at index {index}")]
    MissingTensor {
        /// The configured output name.
        output: String,
        /// The expected response tensor index.
        index: usize,
    },

    /// A scalar output received more than one element.
    #[error("output `{output}`: expected a scalar, response tensor has {got} elements")]
    NotScalar {
        /// The configured output name.
        output: String,
        /// Number of elements actually returned.
        got: usize,
    },

    /// The response tensor carries no elements.
    #[error("output `{output}`: response tensor is empty")]
    EmptyTensor {
        /// The configured output name.
        output: String,
    },

    /// The response tensor datatype cannot be converted to a metric value.
    #[error("output `{output}`: unsupported response datatype `{datatype}`")]
    UnsupportedDatatype {
        /// The configured output name.
        output: String,
        /// The datatype reported by the server.
        datatype: String,
    },

    /// The server answered with raw binary payloads instead of typed contents.
    #[error("output `{output}`: raw output contents are not supported")]
    RawContents {
        /// The configured output name.
        output: String,
    },
}

/// Classified failures of the remote inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Connection-level failure: connect refused, read failure, stream reset.
    #[error("transport error: {message}")]
    Transport {
        /// The transport-level description.
        message: String,
    },

    /// The configured deadline elapsed before the server answered.
    #[error("deadline of {timeout:?} exceeded")]
    Timeout {
        /// The deadline configured for the call.
        timeout: Duration,
    },

    /// The server knows the model but has not finished loading it.
    #[error("model is not ready: {message}")]
    ModelNotReady {
        /// The server-supplied detail.
        message: String,
    },

    /// The server rejected the request shape or types.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// The server-supplied detail.
        message: String,
    },

    /// Any other server-side failure.
    #[error("server error ({code:?}): {message}")]
    Internal {
        /// The gRPC status code.
        code: tonic::Code,
        /// The server-supplied detail.
        message: String,
    },
}

impl InferenceError {
    /// Classifies a gRPC status into the processor's error taxonomy.
    ///
    /// `timeout` is the deadline that was configured for the call; it is
    /// carried on the [`InferenceError::Timeout`] variant when the server
    /// itself reports `DeadlineExceeded`.
    #[must_use]
    pub fn from_status(status: &tonic::Status, timeout: Duration) -> Self {
        let message = status.message().to_string();
        match status.code() {
            tonic::Code::DeadlineExceeded => InferenceError::Timeout { timeout },
            tonic::Code::Unavailable => InferenceError::Transport { message },
            tonic::Code::NotFound => InferenceError::ModelNotReady { message },
            tonic::Code::InvalidArgument | tonic::Code::FailedPrecondition => {
                InferenceError::InvalidArgument { message }
            }
            code => InferenceError::Internal { code, message },
        }
    }

    /// Outcome label recorded for this failure.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            InferenceError::Transport { .. } => outcome::TRANSPORT_ERROR,
            InferenceError::Timeout { .. } => outcome::TIMEOUT,
            InferenceError::ModelNotReady { .. } => outcome::MODEL_NOT_READY,
            InferenceError::InvalidArgument { .. } => outcome::INVALID_ARGUMENT,
            InferenceError::Internal { .. } => outcome::INTERNAL_ERROR,
        }
    }
}

/// Outcome labels shared by the observability counters.
pub mod outcome {
    /// A group produced its configured outputs.
    pub const SUCCESS: &str = "success";
    /// An input selector matched nothing.
    pub const MISSING_INPUT: &str = "missing_input";
    /// Metadata could not be fetched or interpreted.
    pub const METADATA_ERROR: &str = "metadata_error";
    /// The rule disagrees with the model tensor specs.
    pub const INCOMPATIBLE: &str = "incompatible";
    /// An input contributed more than one point to a group.
    pub const AMBIGUOUS_GROUP: &str = "ambiguous_group";
    /// A tensor could not be constructed.
    pub const ENCODING_ERROR: &str = "encoding_error";
    /// A response tensor could not be interpreted.
    pub const DECODING_ERROR: &str = "decoding_error";
    /// Connection-level RPC failure.
    pub const TRANSPORT_ERROR: &str = "transport_error";
    /// The per-rule deadline elapsed.
    pub const TIMEOUT: &str = "timeout";
    /// The model has not finished loading.
    pub const MODEL_NOT_READY: &str = "model_not_ready";
    /// The server rejected the tensor shape or types.
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    /// Any other server failure.
    pub const INTERNAL_ERROR: &str = "internal_error";
}
