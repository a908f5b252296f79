// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration surface and rule compiler.
//!
//! The processor is driven entirely by a declarative rule list binding input
//! metric selectors to a remote model and a set of output metric names.
//! Compilation happens once at startup, is pure (no network access), and
//! produces immutable [`Rule`] values shared across batches. Emitted metric
//! names are fully resolved here, so they are stable for the lifetime of the
//! process.
//!
//! Example configuration (YAML):
//! ```yaml
//! grpc:
//!   endpoint: "dns:///inference-server:8001"
//!   compression: zstd
//! timeout: 5
//! rules:
//!   - model_name: "cpu_prediction"
//!     inputs: ["system.cpu.utilization{state=\"user\"}"]
//!     outputs:
//!       - name: "prediction"
//!         data_type: double
//! ```

use crate::error::ConfigError;
use crate::naming::NamingConfig;
use crate::pattern::{OutputPattern, PatternContext};
use crate::proto::v2::inference::{InferParameter, infer_parameter::ParameterChoice};
use crate::selector::MetricSelector;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::transport::{ClientTlsConfig, Endpoint};

/// Checks if a URI string starts with "https://" (case-insensitive, per RFC 3986).
fn is_https_endpoint(uri: &str) -> bool {
    uri.trim_start()
        .get(..8)
        .is_some_and(|s| s.eq_ignore_ascii_case("https://"))
}

/// Top-level configuration of one processor instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Transport settings for the inference channel.
    pub grpc: GrpcClientSettings,

    /// Per-rule RPC timeout. Accepts integer seconds or a humantime string
    /// such as `"500ms"`.
    #[serde(default = "default_timeout", deserialize_with = "de_seconds")]
    pub timeout: Duration,

    /// Whether startup validates every rule against live model metadata and
    /// fails on any mismatch.
    #[serde(default)]
    pub strict_validation: bool,

    /// Tuning for heuristic output naming.
    #[serde(default)]
    pub naming: NamingConfig,

    /// How long a cached model metadata entry stays fresh.
    #[serde(default = "default_metadata_ttl", with = "humantime_serde")]
    pub metadata_ttl: Duration,

    /// The declarative rule list.
    pub rules: Vec<RuleConfig>,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_metadata_ttl() -> Duration {
    Duration::from_secs(300)
}

/// Accepts either a bare integer (seconds) or a humantime string.
fn de_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecondsOrHumantime {
        Seconds(u64),
        Humantime(#[serde(with = "humantime_serde")] Duration),
    }

    match SecondsOrHumantime::deserialize(deserializer)? {
        SecondsOrHumantime::Seconds(secs) => Ok(Duration::from_secs(secs)),
        SecondsOrHumantime::Humantime(duration) => Ok(duration),
    }
}

/// Common configuration of the gRPC inference channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrpcClientSettings {
    /// The gRPC endpoint to connect to. A bare `host:port` is accepted and
    /// gets a scheme derived from `use_ssl`.
    pub endpoint: String,

    /// Whether to use TLS with the system trust roots. Implied by an
    /// `https://` endpoint.
    #[serde(default)]
    pub use_ssl: bool,

    /// Wire compression applied to inference RPCs. Off by default; the
    /// server must accept whatever is configured here.
    #[serde(default)]
    pub compression: Option<Compression>,

    /// Maximum size of a decoded response message, in bytes.
    #[serde(default)]
    pub max_receive_message_size: Option<usize>,

    /// ASCII metadata attached to every outbound request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// HTTP/2 keepalive settings.
    #[serde(default)]
    pub keepalive: Option<KeepaliveSettings>,

    /// Timeout for establishing TCP connections.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(3)
}

/// HTTP/2 keepalive configuration of the inference channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeepaliveSettings {
    /// Interval between HTTP/2 keepalive pings.
    #[serde(default = "default_keepalive_time", with = "humantime_serde")]
    pub time: Duration,

    /// Timeout waiting for a keepalive acknowledgement.
    #[serde(default = "default_keepalive_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Whether to send keepalives while no stream is active.
    #[serde(default)]
    pub permit_without_stream: bool,
}

const fn default_keepalive_time() -> Duration {
    Duration::from_secs(30)
}

const fn default_keepalive_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Wire compression for inference RPCs.
///
/// Kept as a configuration-level enum so the surface does not leak transport
/// types; [`GrpcClientSettings::compression_encoding`] does the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// gzip, accepted by practically every inference server.
    Gzip,
    /// zstd, cheaper on CPU at comparable ratios.
    Zstd,
    /// deflate, kept for older servers.
    Deflate,
}

impl Compression {
    fn encoding(self) -> CompressionEncoding {
        match self {
            Compression::Gzip => CompressionEncoding::Gzip,
            Compression::Zstd => CompressionEncoding::Zstd,
            Compression::Deflate => CompressionEncoding::Deflate,
        }
    }
}

impl GrpcClientSettings {
    /// Returns the compression encoding to apply to requests, if any.
    #[must_use]
    pub fn compression_encoding(&self) -> Option<CompressionEncoding> {
        self.compression.map(Compression::encoding)
    }

    /// The endpoint with a scheme, deriving one from `use_ssl` when absent.
    #[must_use]
    pub fn normalized_endpoint(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.clone();
        }
        if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }

    /// Builds the configured transport [`Endpoint`].
    pub fn build_endpoint(&self) -> Result<Endpoint, ConfigError> {
        let uri = self.normalized_endpoint();
        let invalid = |error: tonic::transport::Error| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            error: error.to_string(),
        };

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(invalid)?
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(true);

        if let Some(keepalive) = &self.keepalive {
            endpoint = endpoint
                .http2_keep_alive_interval(keepalive.time)
                .keep_alive_timeout(keepalive.timeout)
                .keep_alive_while_idle(keepalive.permit_without_stream);
        }

        if self.use_ssl || is_https_endpoint(&uri) {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(invalid)?;
        }

        Ok(endpoint)
    }
}

/// One declarative binding from input metrics to a remote model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Name of the remote model to invoke.
    pub model_name: String,

    /// Model version to pin; the server chooses when absent.
    #[serde(default)]
    pub model_version: Option<String>,

    /// Input selectors, in the tensor order declared by the model.
    pub inputs: Vec<String>,

    /// Template for emitted metric names. When absent, names are derived
    /// heuristically from the input names.
    #[serde(default)]
    pub output_pattern: Option<String>,

    /// Outputs to materialize from the model response.
    pub outputs: Vec<OutputConfig>,

    /// Opaque scalar parameters forwarded with every inference request.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// One output metric materialized from a response tensor.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output name; the last segment of the emitted metric name.
    pub name: String,

    /// Value type of the emitted data points.
    pub data_type: OutputDataType,

    /// Index of the response tensor backing this output. Defaults to the
    /// output's position in the list.
    #[serde(default)]
    pub output_index: Option<usize>,

    /// Unit of the emitted metric, in UCUM notation.
    #[serde(default)]
    pub unit: Option<String>,

    /// Description of the emitted metric.
    #[serde(default)]
    pub description: Option<String>,
}

/// Value types an output data point can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDataType {
    /// Emit integer data points.
    Int,
    /// Emit double data points (single precision responses are widened).
    Float,
    /// Emit double data points.
    Double,
}

/// Scalar parameter values forwarded to the model as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A boolean parameter.
    Bool(bool),
    /// An integer parameter.
    Int(i64),
    /// A floating point parameter.
    Float(f64),
    /// A string parameter.
    String(String),
}

impl From<&ParameterValue> for InferParameter {
    fn from(value: &ParameterValue) -> Self {
        let choice = match value {
            ParameterValue::Bool(b) => ParameterChoice::BoolParam(*b),
            ParameterValue::Int(i) => ParameterChoice::Int64Param(*i),
            ParameterValue::Float(f) => ParameterChoice::DoubleParam(*f),
            ParameterValue::String(s) => ParameterChoice::StringParam(s.clone()),
        };
        InferParameter {
            parameter_choice: Some(choice),
        }
    }
}

/// A compiled rule: immutable for the lifetime of the processor.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Position of the rule in the configured list.
    pub index: usize,
    /// Name of the remote model.
    pub model_name: String,
    /// Pinned model version, if any.
    pub model_version: Option<String>,
    /// Parsed input selectors, in tensor order.
    pub inputs: Vec<MetricSelector>,
    /// Compiled outputs with fully resolved metric names.
    pub outputs: Vec<CompiledOutput>,
    /// Wire-ready request parameters.
    pub parameters: BTreeMap<String, InferParameter>,
    /// Per-RPC deadline for this rule.
    pub timeout: Duration,
}

impl Rule {
    /// The input metric names, in rule order.
    #[must_use]
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .map(|selector| selector.metric_name.as_str())
            .collect()
    }
}

/// A compiled output with its resolved emitted-metric name.
#[derive(Debug, Clone)]
pub struct CompiledOutput {
    /// Fully resolved emitted metric name.
    pub metric_name: String,
    /// Output name as configured.
    pub output_name: String,
    /// Value type of the emitted data points.
    pub data_type: OutputDataType,
    /// Index of the backing response tensor.
    pub response_index: usize,
    /// Unit of the emitted metric.
    pub unit: Option<String>,
    /// Description override for the emitted metric.
    pub description: Option<String>,
}

impl Config {
    /// Compiles the declarative rule list into immutable [`Rule`] values.
    ///
    /// Compilation is pure: it validates structure, parses selectors and
    /// patterns, and resolves every emitted metric name, but never touches
    /// the network. Strict validation against live metadata happens later,
    /// when the processor is built.
    pub fn compile_rules(&self) -> Result<Vec<Rule>, ConfigError> {
        let mut rules = Vec::with_capacity(self.rules.len());
        let mut emitted_names: HashSet<String> = HashSet::new();

        for (rule_index, rule) in self.rules.iter().enumerate() {
            if rule.model_name.trim().is_empty() {
                return Err(ConfigError::InvalidRule {
                    rule_index,
                    error: "model_name must not be empty".to_string(),
                });
            }
            if rule.inputs.is_empty() {
                return Err(ConfigError::InvalidRule {
                    rule_index,
                    error: "rule declares no inputs".to_string(),
                });
            }
            if rule.outputs.is_empty() {
                return Err(ConfigError::InvalidRule {
                    rule_index,
                    error: "rule declares no outputs".to_string(),
                });
            }

            let mut selectors = Vec::with_capacity(rule.inputs.len());
            for input in &rule.inputs {
                let selector =
                    MetricSelector::parse(input).map_err(|source| ConfigError::InvalidSelector {
                        rule_index,
                        selector: input.clone(),
                        source,
                    })?;
                selectors.push(selector);
            }

            let pattern = match &rule.output_pattern {
                Some(template) => Some(OutputPattern::parse(template).map_err(|source| {
                    ConfigError::InvalidPattern {
                        rule_index,
                        pattern: template.clone(),
                        source,
                    }
                })?),
                None => None,
            };

            let input_names: Vec<&str> = selectors
                .iter()
                .map(|selector| selector.metric_name.as_str())
                .collect();
            let version = rule.model_version.as_deref().unwrap_or_default();

            let mut seen_indices: HashSet<usize> = HashSet::new();
            let mut outputs = Vec::with_capacity(rule.outputs.len());
            for (position, output) in rule.outputs.iter().enumerate() {
                let response_index = output.output_index.unwrap_or(position);
                if !seen_indices.insert(response_index) {
                    return Err(ConfigError::InvalidRule {
                        rule_index,
                        error: format!(
                            "output `{}` reuses output_index {response_index}",
                            output.name
                        ),
                    });
                }

                let metric_name = match &pattern {
                    Some(pattern) => pattern.render(&PatternContext {
                        model: &rule.model_name,
                        version,
                        output: &output.name,
                        inputs: &input_names,
                    }),
                    None => {
                        self.naming
                            .derive_name(&input_names, &rule.model_name, &output.name)
                    }
                };
                if !emitted_names.insert(metric_name.clone()) {
                    return Err(ConfigError::DuplicateOutputName {
                        rule_index,
                        name: metric_name,
                    });
                }

                outputs.push(CompiledOutput {
                    metric_name,
                    output_name: output.name.clone(),
                    data_type: output.data_type,
                    response_index,
                    unit: output.unit.clone(),
                    description: output.description.clone(),
                });
            }

            let parameters = rule
                .parameters
                .iter()
                .map(|(key, value)| (key.clone(), InferParameter::from(value)))
                .collect();

            rules.push(Rule {
                index: rule_index,
                model_name: rule.model_name.clone(),
                model_version: rule.model_version.clone(),
                inputs: selectors,
                outputs,
                parameters,
                timeout: self.timeout,
            });
        }

        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config(rules: serde_json::Value) -> Config {
        serde_json::from_value(json!({
            "grpc": { "endpoint": "http://localhost:8001" },
            "rules": rules,
        }))
        .unwrap()
    }

    #[test]
    fn compiles_a_minimal_rule() {
        let config = base_config(json!([{
            "model_name": "cpu_prediction",
            "inputs": ["system.cpu.utilization"],
            "outputs": [{ "name": "prediction", "data_type": "double" }],
        }]));
        let rules = config.compile_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].outputs[0].metric_name, "cpu_utilization.prediction");
        assert_eq!(rules[0].outputs[0].response_index, 0);
        assert_eq!(rules[0].timeout, Duration::from_secs(10));
    }

    #[test]
    fn pattern_overrides_heuristic_naming() {
        let config = base_config(json!([{
            "model_name": "cpu_prediction",
            "inputs": ["system.cpu.utilization"],
            "output_pattern": "{output}",
            "outputs": [{ "name": "system_cpu.predicted", "data_type": "float" }],
        }]));
        let rules = config.compile_rules().unwrap();
        assert_eq!(rules[0].outputs[0].metric_name, "system_cpu.predicted");
    }

    #[test]
    fn timeout_accepts_seconds_and_humantime() {
        let config: Config = serde_json::from_value(json!({
            "grpc": { "endpoint": "http://localhost:8001" },
            "timeout": 5,
            "rules": [],
        }))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));

        let config: Config = serde_json::from_value(json!({
            "grpc": { "endpoint": "http://localhost:8001" },
            "timeout": "250ms",
            "rules": [],
        }))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_rule_without_inputs() {
        let config = base_config(json!([{
            "model_name": "m",
            "inputs": [],
            "outputs": [{ "name": "p", "data_type": "int" }],
        }]));
        assert!(matches!(
            config.compile_rules().unwrap_err(),
            ConfigError::InvalidRule { rule_index: 0, .. }
        ));
    }

    #[test]
    fn rejects_rule_without_outputs() {
        let config = base_config(json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [],
        }]));
        assert!(matches!(
            config.compile_rules().unwrap_err(),
            ConfigError::InvalidRule { rule_index: 0, .. }
        ));
    }

    #[test]
    fn rejects_duplicate_output_indices() {
        let config = base_config(json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [
                { "name": "x", "data_type": "int", "output_index": 1 },
                { "name": "y", "data_type": "int", "output_index": 1 },
            ],
        }]));
        assert!(matches!(
            config.compile_rules().unwrap_err(),
            ConfigError::InvalidRule { rule_index: 0, .. }
        ));
    }

    #[test]
    fn rejects_duplicate_emitted_names_across_rules() {
        let config = base_config(json!([
            {
                "model_name": "m1",
                "inputs": ["system.cpu.utilization"],
                "outputs": [{ "name": "p", "data_type": "int" }],
            },
            {
                "model_name": "m2",
                "inputs": ["system.cpu.utilization"],
                "outputs": [{ "name": "p", "data_type": "int" }],
            },
        ]));
        assert!(matches!(
            config.compile_rules().unwrap_err(),
            ConfigError::DuplicateOutputName { rule_index: 1, .. }
        ));
    }

    #[test]
    fn rejects_unknown_placeholder_in_pattern() {
        let config = base_config(json!([{
            "model_name": "m",
            "inputs": ["a"],
            "output_pattern": "{bogus}",
            "outputs": [{ "name": "p", "data_type": "int" }],
        }]));
        assert!(matches!(
            config.compile_rules().unwrap_err(),
            ConfigError::InvalidPattern { rule_index: 0, .. }
        ));
    }

    #[test]
    fn parameters_map_onto_wire_values() {
        let config = base_config(json!([{
            "model_name": "m",
            "inputs": ["a"],
            "outputs": [{ "name": "p", "data_type": "int" }],
            "parameters": { "threshold": 0.5, "window": 3, "debug": true, "mode": "fast" },
        }]));
        let rules = config.compile_rules().unwrap();
        let params = &rules[0].parameters;
        assert!(matches!(
            params.get("threshold").and_then(|p| p.parameter_choice.as_ref()),
            Some(ParameterChoice::DoubleParam(v)) if (*v - 0.5).abs() < f64::EPSILON
        ));
        assert!(matches!(
            params.get("window").and_then(|p| p.parameter_choice.as_ref()),
            Some(ParameterChoice::Int64Param(3))
        ));
        assert!(matches!(
            params.get("debug").and_then(|p| p.parameter_choice.as_ref()),
            Some(ParameterChoice::BoolParam(true))
        ));
        assert!(matches!(
            params.get("mode").and_then(|p| p.parameter_choice.as_ref()),
            Some(ParameterChoice::StringParam(s)) if s == "fast"
        ));
    }

    #[test]
    fn endpoint_scheme_follows_use_ssl() {
        let settings: GrpcClientSettings =
            serde_json::from_value(json!({ "endpoint": "localhost:8001" })).unwrap();
        assert_eq!(settings.normalized_endpoint(), "http://localhost:8001");

        let settings: GrpcClientSettings =
            serde_json::from_value(json!({ "endpoint": "localhost:8001", "use_ssl": true }))
                .unwrap();
        assert_eq!(settings.normalized_endpoint(), "https://localhost:8001");

        let settings: GrpcClientSettings =
            serde_json::from_value(json!({ "endpoint": "https://remote:443" })).unwrap();
        assert_eq!(settings.normalized_endpoint(), "https://remote:443");
    }

    #[test]
    fn compression_maps_onto_an_encoding() {
        let settings: GrpcClientSettings = serde_json::from_value(json!({
            "endpoint": "http://localhost:8001",
            "compression": "zstd",
        }))
        .unwrap();
        assert_eq!(settings.compression, Some(Compression::Zstd));
        assert!(settings.compression_encoding().is_some());

        let settings: GrpcClientSettings =
            serde_json::from_value(json!({ "endpoint": "http://localhost:8001" })).unwrap();
        assert!(settings.compression_encoding().is_none());

        // Only the three supported encodings are accepted, in snake_case.
        let result = serde_json::from_value::<GrpcClientSettings>(json!({
            "endpoint": "http://localhost:8001",
            "compression": "br",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn build_endpoint_accepts_keepalive_settings() {
        let settings: GrpcClientSettings = serde_json::from_value(json!({
            "endpoint": "http://localhost:8001",
            "keepalive": { "time": "30s", "timeout": "10s", "permit_without_stream": true },
        }))
        .unwrap();
        assert!(settings.build_endpoint().is_ok());
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let settings: GrpcClientSettings =
            serde_json::from_value(json!({ "endpoint": "not a uri" })).unwrap();
        assert!(matches!(
            settings.build_endpoint().unwrap_err(),
            ConfigError::InvalidEndpoint { .. }
        ));
    }
}
