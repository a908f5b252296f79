// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Conversion of response tensors into new gauge metrics.
//!
//! Each configured output is matched to a response tensor by its resolved
//! index and materialized as a gauge carrying the group's attributes
//! (prefixed with the contributing input metric name) plus the provenance
//! attribute [`MODEL_NAME_ATTRIBUTE`]. Attribute prefixing keeps labels from
//! different inputs apart even when they share a name.

use crate::config::{OutputDataType, Rule};
use crate::error::DecodeError;
use crate::matcher::Group;
use crate::pdata::opentelemetry::common::v1::{AnyValue, KeyValue, any_value::Value};
use crate::pdata::opentelemetry::metrics::v1::{
    Gauge, Metric, NumberDataPoint, metric::Data, number_data_point::Value as NumberValue,
};
use crate::proto::v2::inference::{
    ModelInferResponse, model_infer_response::InferOutputTensor,
};

/// Attribute naming the model that produced an emitted data point.
pub const MODEL_NAME_ATTRIBUTE: &str = "otel.inference.model.name";

/// Materializes the configured outputs of one (rule, group) inference call.
///
/// Returns one gauge metric per configured output, in rule order.
pub(crate) fn materialize(
    rule: &Rule,
    group: &Group,
    response: &ModelInferResponse,
    time_unix_nano: u64,
) -> Result<Vec<Metric>, DecodeError> {
    let attributes = propagated_attributes(rule, group);
    let scalar_group = !group.key.is_empty();

    let mut metrics = Vec::with_capacity(rule.outputs.len());
    for output in &rule.outputs {
        if !response.raw_output_contents.is_empty() {
            return Err(DecodeError::RawContents {
                output: output.output_name.clone(),
            });
        }
        let tensor = response.outputs.get(output.response_index).ok_or_else(|| {
            DecodeError::MissingTensor {
                output: output.output_name.clone(),
                index: output.response_index,
            }
        })?;

        let values = tensor_values(tensor, &output.output_name)?;
        if values.is_empty() {
            return Err(DecodeError::EmptyTensor {
                output: output.output_name.clone(),
            });
        }
        if scalar_group && values.len() > 1 {
            return Err(DecodeError::NotScalar {
                output: output.output_name.clone(),
                got: values.len(),
            });
        }

        let data_points = values
            .iter()
            .map(|value| NumberDataPoint {
                attributes: attributes.clone(),
                start_time_unix_nano: 0,
                time_unix_nano,
                exemplars: vec![],
                flags: 0,
                value: Some(cast_value(*value, output.data_type)),
            })
            .collect();

        metrics.push(Metric {
            name: output.metric_name.clone(),
            description: output.description.clone().unwrap_or_else(|| {
                format!("Inference result from model {}", rule.model_name)
            }),
            unit: output.unit.clone().unwrap_or_default(),
            metadata: vec![],
            data: Some(Data::Gauge(Gauge { data_points })),
        });
    }

    Ok(metrics)
}

/// The group-key attributes of every contributing input, prefixed with the
/// input metric name, plus the model provenance attribute.
fn propagated_attributes(rule: &Rule, group: &Group) -> Vec<KeyValue> {
    let mut attributes = Vec::new();
    for (input_index, selector) in rule.inputs.iter().enumerate() {
        let Some(point) = group.per_input.get(input_index).and_then(|p| p.first()) else {
            continue;
        };
        for (key, _) in &group.key {
            if let Some((_, value, _)) = point.attrs.iter().find(|(name, _, _)| name == key) {
                attributes.push(KeyValue {
                    key: format!("{}.{}", selector.metric_name, key),
                    value: Some(value.clone()),
                });
            }
        }
    }
    attributes.push(KeyValue {
        key: MODEL_NAME_ATTRIBUTE.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(rule.model_name.clone())),
        }),
    });
    attributes
}

#[derive(Debug, Clone, Copy)]
enum TensorValue {
    Int(i64),
    Double(f64),
}

fn tensor_values(tensor: &InferOutputTensor, output: &str) -> Result<Vec<TensorValue>, DecodeError> {
    let Some(contents) = tensor.contents.as_ref() else {
        return Ok(Vec::new());
    };
    let values = match tensor.datatype.as_str() {
        "FP32" => contents
            .fp32_contents
            .iter()
            .map(|v| TensorValue::Double(f64::from(*v)))
            .collect(),
        "FP64" => contents
            .fp64_contents
            .iter()
            .map(|v| TensorValue::Double(*v))
            .collect(),
        "INT8" | "INT16" | "INT32" => contents
            .int_contents
            .iter()
            .map(|v| TensorValue::Int(i64::from(*v)))
            .collect(),
        "INT64" => contents
            .int64_contents
            .iter()
            .map(|v| TensorValue::Int(*v))
            .collect(),
        "UINT8" | "UINT16" | "UINT32" => contents
            .uint_contents
            .iter()
            .map(|v| TensorValue::Int(i64::from(*v)))
            .collect(),
        "UINT64" => contents
            .uint64_contents
            .iter()
            .map(|v| TensorValue::Int(*v as i64))
            .collect(),
        datatype => {
            return Err(DecodeError::UnsupportedDatatype {
                output: output.to_string(),
                datatype: datatype.to_string(),
            });
        }
    };
    Ok(values)
}

fn cast_value(value: TensorValue, data_type: OutputDataType) -> NumberValue {
    match data_type {
        OutputDataType::Int => NumberValue::AsInt(match value {
            TensorValue::Int(v) => v,
            TensorValue::Double(v) => v as i64,
        }),
        OutputDataType::Float | OutputDataType::Double => NumberValue::AsDouble(match value {
            TensorValue::Int(v) => v as f64,
            TensorValue::Double(v) => v,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchedPoint, PointValue};
    use crate::proto::v2::inference::InferTensorContents;
    use serde_json::json;

    fn rule(outputs: serde_json::Value) -> Rule {
        let config: crate::config::Config = serde_json::from_value(json!({
            "grpc": { "endpoint": "http://localhost:8001" },
            "rules": [{
                "model_name": "cpu_prediction",
                "inputs": ["system.cpu.utilization"],
                "outputs": outputs,
            }],
        }))
        .unwrap();
        config.compile_rules().unwrap().remove(0)
    }

    fn string_attr(key: &str, value: &str) -> (String, AnyValue, String) {
        (
            key.to_string(),
            AnyValue {
                value: Some(Value::StringValue(value.to_string())),
            },
            value.to_string(),
        )
    }

    fn keyed_group() -> Group {
        Group {
            key: vec![
                ("cpu".to_string(), "0".to_string()),
                ("state".to_string(), "user".to_string()),
            ],
            serialized_key: "cpu=0,state=user".to_string(),
            per_input: vec![vec![MatchedPoint {
                value: PointValue::Double(0.75),
                time_unix_nano: 1,
                attrs: vec![string_attr("cpu", "0"), string_attr("state", "user")],
            }]],
        }
    }

    fn fp32_response(values: Vec<f32>) -> ModelInferResponse {
        ModelInferResponse {
            model_name: "cpu_prediction".to_string(),
            model_version: String::new(),
            id: String::new(),
            parameters: Default::default(),
            outputs: vec![InferOutputTensor {
                name: "OUTPUT__0".to_string(),
                datatype: "FP32".to_string(),
                shape: vec![values.len() as i64],
                parameters: Default::default(),
                contents: Some(InferTensorContents {
                    fp32_contents: values,
                    ..InferTensorContents::default()
                }),
            }],
            raw_output_contents: vec![],
        }
    }

    #[test]
    fn materializes_a_scalar_output_with_prefixed_attributes() {
        let rule = rule(json!([{ "name": "prediction", "data_type": "float" }]));
        let metrics = materialize(&rule, &keyed_group(), &fp32_response(vec![0.85]), 42).unwrap();
        assert_eq!(metrics.len(), 1);

        let metric = &metrics[0];
        assert_eq!(metric.name, "cpu_utilization.prediction");
        assert_eq!(
            metric.description,
            "Inference result from model cpu_prediction"
        );
        let Some(Data::Gauge(gauge)) = &metric.data else {
            panic!("expected gauge data");
        };
        assert_eq!(gauge.data_points.len(), 1);
        let point = &gauge.data_points[0];
        assert_eq!(point.time_unix_nano, 42);
        let Some(NumberValue::AsDouble(value)) = point.value else {
            panic!("expected double value");
        };
        assert!((value - 0.85).abs() < 1e-6);

        let keys: Vec<&str> = point.attributes.iter().map(|kv| kv.key.as_str()).collect();
        assert!(keys.contains(&"system.cpu.utilization.cpu"));
        assert!(keys.contains(&"system.cpu.utilization.state"));
        assert!(keys.contains(&MODEL_NAME_ATTRIBUTE));

        let model = point
            .attributes
            .iter()
            .find(|kv| kv.key == MODEL_NAME_ATTRIBUTE)
            .and_then(|kv| kv.value.as_ref())
            .and_then(|v| v.value.as_ref());
        assert!(matches!(model, Some(Value::StringValue(s)) if s == "cpu_prediction"));
    }

    #[test]
    fn int_output_truncates_to_as_int() {
        let rule = rule(json!([{ "name": "class", "data_type": "int" }]));
        let metrics = materialize(&rule, &keyed_group(), &fp32_response(vec![1.9]), 0).unwrap();
        let Some(Data::Gauge(gauge)) = &metrics[0].data else {
            panic!("expected gauge data");
        };
        assert!(matches!(
            gauge.data_points[0].value,
            Some(NumberValue::AsInt(1))
        ));
    }

    #[test]
    fn output_description_and_unit_are_honored() {
        let rule = rule(json!([{
            "name": "prediction",
            "data_type": "double",
            "unit": "1",
            "description": "CPU forecast",
        }]));
        let metrics = materialize(&rule, &keyed_group(), &fp32_response(vec![0.5]), 0).unwrap();
        assert_eq!(metrics[0].description, "CPU forecast");
        assert_eq!(metrics[0].unit, "1");
    }

    #[test]
    fn scalar_group_rejects_multi_element_tensor() {
        let rule = rule(json!([{ "name": "prediction", "data_type": "double" }]));
        let err = materialize(&rule, &keyed_group(), &fp32_response(vec![0.1, 0.2]), 0)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotScalar { got: 2, .. }));
    }

    #[test]
    fn vector_group_accepts_multi_element_tensor() {
        let rule = rule(json!([{ "name": "prediction", "data_type": "double" }]));
        let group = Group {
            key: vec![],
            serialized_key: String::new(),
            per_input: vec![vec![
                MatchedPoint {
                    value: PointValue::Double(1.0),
                    time_unix_nano: 1,
                    attrs: vec![],
                },
                MatchedPoint {
                    value: PointValue::Double(2.0),
                    time_unix_nano: 2,
                    attrs: vec![],
                },
            ]],
        };
        let metrics = materialize(&rule, &group, &fp32_response(vec![0.1, 0.2]), 0).unwrap();
        let Some(Data::Gauge(gauge)) = &metrics[0].data else {
            panic!("expected gauge data");
        };
        assert_eq!(gauge.data_points.len(), 2);
    }

    #[test]
    fn missing_tensor_is_an_error() {
        let rule = rule(json!([
            { "name": "a", "data_type": "double" },
            { "name": "b", "data_type": "double" },
        ]));
        let err = materialize(&rule, &keyed_group(), &fp32_response(vec![0.1]), 0).unwrap_err();
        assert!(matches!(err, DecodeError::MissingTensor { index: 1, .. }));
    }

    #[test]
    fn raw_output_contents_are_rejected() {
        let rule = rule(json!([{ "name": "prediction", "data_type": "double" }]));
        let mut response = fp32_response(vec![0.1]);
        response.raw_output_contents = vec![vec![0, 0, 0, 0]];
        let err = materialize(&rule, &keyed_group(), &response, 0).unwrap_err();
        assert!(matches!(err, DecodeError::RawContents { .. }));
    }

    #[test]
    fn unsupported_response_datatype_is_rejected() {
        let rule = rule(json!([{ "name": "prediction", "data_type": "double" }]));
        let mut response = fp32_response(vec![]);
        response.outputs[0].datatype = "BYTES".to_string();
        let err = materialize(&rule, &keyed_group(), &response, 0).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedDatatype { .. }));
    }
}
