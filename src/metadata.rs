// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Model metadata cache and rule/spec compatibility checks.
//!
//! Metadata is fetched lazily on first use of a model, cached per
//! `(model, version)` and refreshed after a configurable TTL. Concurrent
//! misses for the same key are collapsed into a single `ModelMetadata` RPC.
//! Transport failures are returned to the caller and never cached.

use crate::client::InferenceClient;
use crate::config::Rule;
use crate::error::RuleError;
use crate::proto::v2::inference::ModelMetadataResponse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Tensor datatypes of the KServe open inference protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorDataType {
    /// `BOOL`
    Bool,
    /// `INT8`
    Int8,
    /// `INT16`
    Int16,
    /// `INT32`
    Int32,
    /// `INT64`
    Int64,
    /// `UINT8`
    Uint8,
    /// `UINT16`
    Uint16,
    /// `UINT32`
    Uint32,
    /// `UINT64`
    Uint64,
    /// `FP16`
    Fp16,
    /// `FP32`
    Fp32,
    /// `FP64`
    Fp64,
    /// `BYTES`
    Bytes,
}

impl TensorDataType {
    /// Parses a KServe wire datatype string.
    #[must_use]
    pub fn from_wire(datatype: &str) -> Option<Self> {
        match datatype {
            "BOOL" => Some(TensorDataType::Bool),
            "INT8" => Some(TensorDataType::Int8),
            "INT16" => Some(TensorDataType::Int16),
            "INT32" => Some(TensorDataType::Int32),
            "INT64" => Some(TensorDataType::Int64),
            "UINT8" => Some(TensorDataType::Uint8),
            "UINT16" => Some(TensorDataType::Uint16),
            "UINT32" => Some(TensorDataType::Uint32),
            "UINT64" => Some(TensorDataType::Uint64),
            "FP16" => Some(TensorDataType::Fp16),
            "FP32" => Some(TensorDataType::Fp32),
            "FP64" => Some(TensorDataType::Fp64),
            "BYTES" => Some(TensorDataType::Bytes),
            _ => None,
        }
    }

    /// The KServe wire name of this datatype.
    #[must_use]
    pub const fn wire_name(&self) -> &'static str {
        match self {
            TensorDataType::Bool => "BOOL",
            TensorDataType::Int8 => "INT8",
            TensorDataType::Int16 => "INT16",
            TensorDataType::Int32 => "INT32",
            TensorDataType::Int64 => "INT64",
            TensorDataType::Uint8 => "UINT8",
            TensorDataType::Uint16 => "UINT16",
            TensorDataType::Uint32 => "UINT32",
            TensorDataType::Uint64 => "UINT64",
            TensorDataType::Fp16 => "FP16",
            TensorDataType::Fp32 => "FP32",
            TensorDataType::Fp64 => "FP64",
            TensorDataType::Bytes => "BYTES",
        }
    }
}

/// The `(name, datatype, shape)` triple of one model input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    /// Tensor name.
    pub name: String,
    /// Tensor datatype.
    pub datatype: TensorDataType,
    /// Tensor shape; -1 denotes a dynamic dimension.
    pub shape: Vec<i64>,
}

/// Parsed model metadata: ordered input and output tensor specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Framework/backend identifier reported by the server.
    pub platform: String,
    /// Ordered input tensor specs.
    pub inputs: Vec<TensorSpec>,
    /// Ordered output tensor specs.
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    /// Interprets a raw metadata response, rejecting unknown datatypes.
    pub fn from_response(response: ModelMetadataResponse) -> Result<Self, RuleError> {
        let parse = |tensors: Vec<crate::proto::v2::inference::model_metadata_response::TensorMetadata>|
         -> Result<Vec<TensorSpec>, RuleError> {
            tensors
                .into_iter()
                .map(|tensor| {
                    let datatype = TensorDataType::from_wire(&tensor.datatype).ok_or_else(|| {
                        RuleError::InvalidMetadata {
                            error: format!(
                                "tensor `{}` has unknown datatype `{}`",
                                tensor.name, tensor.datatype
                            ),
                        }
                    })?;
                    Ok(TensorSpec {
                        name: tensor.name,
                        datatype,
                        shape: tensor.shape,
                    })
                })
                .collect()
        };

        Ok(Self {
            platform: response.platform,
            inputs: parse(response.inputs)?,
            outputs: parse(response.outputs)?,
        })
    }
}

type ModelKey = (String, Option<String>);

struct CacheEntry {
    spec: Arc<ModelSpec>,
    fetched_at: Instant,
}

/// Process-wide, read-mostly cache of model metadata.
pub struct MetadataCache {
    ttl: Duration,
    entries: RwLock<HashMap<ModelKey, CacheEntry>>,
    // Per-key fetch serialization so concurrent misses issue one RPC.
    fetch_locks: std::sync::Mutex<HashMap<ModelKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl MetadataCache {
    /// Creates an empty cache whose entries stay fresh for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            fetch_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the spec for `(model, version)`, fetching it over the wire on
    /// a miss or when the cached entry is stale. With `force` set, the cache
    /// is bypassed and the entry refetched unconditionally.
    pub async fn get_spec(
        &self,
        client: &mut InferenceClient,
        model: &str,
        version: Option<&str>,
        force: bool,
    ) -> Result<Arc<ModelSpec>, RuleError> {
        let key: ModelKey = (model.to_string(), version.map(str::to_string));

        if !force {
            if let Some(spec) = self.fresh(&key) {
                return Ok(spec);
            }
        }

        let key_lock = self.key_lock(&key);
        let _fetch_guard = key_lock.lock().await;

        // Double-check under the key lock: another caller may have fetched
        // while we were waiting.
        if !force {
            if let Some(spec) = self.fresh(&key) {
                return Ok(spec);
            }
        }

        let response = client
            .model_metadata(model, version)
            .await
            .map_err(|source| RuleError::Metadata { source })?;
        let spec = Arc::new(ModelSpec::from_response(response)?);

        if let Ok(mut entries) = self.entries.write() {
            let _ = entries.insert(
                key,
                CacheEntry {
                    spec: Arc::clone(&spec),
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(spec)
    }

    fn fresh(&self, key: &ModelKey) -> Option<Arc<ModelSpec>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.fetched_at.elapsed() <= self.ttl {
            Some(Arc::clone(&entry.spec))
        } else {
            None
        }
    }

    fn key_lock(&self, key: &ModelKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// Checks the batch-independent parts of rule/spec compatibility: the input
/// count, the reachability of every configured response tensor index, and
/// that each declared input can be fed from number data points at all.
/// Datatype widening and shape resolution happen per group at encode time.
pub fn validate_rule(rule: &Rule, spec: &ModelSpec) -> Result<(), RuleError> {
    // Variadic specs (trailing dynamic-dim inputs) deliberately do not widen
    // the configured input list.
    if rule.inputs.len() != spec.inputs.len() {
        return Err(RuleError::Incompatible {
            error: format!(
                "rule declares {} input(s) but model `{}` expects {}",
                rule.inputs.len(),
                rule.model_name,
                spec.inputs.len()
            ),
        });
    }

    for input in &spec.inputs {
        match input.datatype {
            TensorDataType::Int64 | TensorDataType::Fp64 => {}
            other => {
                return Err(RuleError::Incompatible {
                    error: format!(
                        "model input `{}` expects {}, which cannot be fed from metric points \
                         without narrowing",
                        input.name,
                        other.wire_name()
                    ),
                });
            }
        }
    }

    for output in &rule.outputs {
        if output.response_index >= spec.outputs.len() {
            return Err(RuleError::Incompatible {
                error: format!(
                    "output `{}` references response tensor {} but model `{}` declares only {}",
                    output.output_name,
                    output.response_index,
                    rule.model_name,
                    spec.outputs.len()
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::v2::inference::model_metadata_response::TensorMetadata;
    use serde_json::json;

    fn spec(inputs: usize, outputs: usize) -> ModelSpec {
        ModelSpec {
            platform: "test".to_string(),
            inputs: (0..inputs)
                .map(|i| TensorSpec {
                    name: format!("INPUT__{i}"),
                    datatype: TensorDataType::Fp64,
                    shape: vec![1],
                })
                .collect(),
            outputs: (0..outputs)
                .map(|i| TensorSpec {
                    name: format!("OUTPUT__{i}"),
                    datatype: TensorDataType::Fp64,
                    shape: vec![1],
                })
                .collect(),
        }
    }

    fn rule(inputs: &[&str], outputs: usize) -> Rule {
        let config: crate::config::Config = serde_json::from_value(json!({
            "grpc": { "endpoint": "http://localhost:8001" },
            "rules": [{
                "model_name": "m",
                "inputs": inputs,
                "outputs": (0..outputs)
                    .map(|i| json!({ "name": format!("o{i}"), "data_type": "double" }))
                    .collect::<Vec<_>>(),
            }],
        }))
        .unwrap();
        config.compile_rules().unwrap().remove(0)
    }

    #[test]
    fn parses_wire_datatypes() {
        assert_eq!(TensorDataType::from_wire("FP64"), Some(TensorDataType::Fp64));
        assert_eq!(TensorDataType::from_wire("INT64"), Some(TensorDataType::Int64));
        assert_eq!(TensorDataType::from_wire("COMPLEX"), None);
        assert_eq!(TensorDataType::Fp32.wire_name(), "FP32");
    }

    #[test]
    fn rejects_unknown_datatype_in_metadata() {
        let response = ModelMetadataResponse {
            name: "m".to_string(),
            versions: vec![],
            platform: "test".to_string(),
            inputs: vec![TensorMetadata {
                name: "in".to_string(),
                datatype: "COMPLEX128".to_string(),
                shape: vec![1],
            }],
            outputs: vec![],
        };
        assert!(matches!(
            ModelSpec::from_response(response).unwrap_err(),
            RuleError::InvalidMetadata { .. }
        ));
    }

    #[test]
    fn validates_input_count() {
        let r = rule(&["a", "b"], 1);
        assert!(matches!(
            validate_rule(&r, &spec(1, 1)).unwrap_err(),
            RuleError::Incompatible { .. }
        ));
        assert!(validate_rule(&r, &spec(2, 1)).is_ok());
    }

    #[test]
    fn validates_response_tensor_indices() {
        let r = rule(&["a"], 2);
        assert!(matches!(
            validate_rule(&r, &spec(1, 1)).unwrap_err(),
            RuleError::Incompatible { .. }
        ));
        assert!(validate_rule(&r, &spec(1, 2)).is_ok());
    }

    #[test]
    fn rejects_specs_that_would_narrow() {
        let r = rule(&["a"], 1);
        let mut s = spec(1, 1);
        s.inputs[0].datatype = TensorDataType::Fp32;
        assert!(matches!(
            validate_rule(&r, &s).unwrap_err(),
            RuleError::Incompatible { .. }
        ));
    }
}
