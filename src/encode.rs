// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Construction of typed request tensors from grouped data points.
//!
//! Each input tensor is built in rule order from the group's points,
//! converted once to the datatype declared by the model metadata. Widening
//! (integer points into an `FP64` tensor) is allowed; narrowing is rejected
//! before any request is sent.

use crate::error::EncodeError;
use crate::matcher::{Group, PointValue};
use crate::metadata::{ModelSpec, TensorDataType, TensorSpec};
use crate::proto::v2::inference::{InferTensorContents, model_infer_request::InferInputTensor};

/// Builds one request tensor per rule input for a single group.
///
/// The caller guarantees `spec.inputs` has as many entries as the group has
/// inputs (checked by `metadata::validate_rule`).
pub(crate) fn encode_group(
    spec: &ModelSpec,
    group: &Group,
) -> Result<Vec<InferInputTensor>, EncodeError> {
    group
        .per_input
        .iter()
        .zip(&spec.inputs)
        .map(|(points, tensor_spec)| encode_tensor(points, tensor_spec))
        .collect()
}

fn encode_tensor(
    points: &[crate::matcher::MatchedPoint],
    spec: &TensorSpec,
) -> Result<InferInputTensor, EncodeError> {
    let shape = resolve_shape(spec, points.len())?;

    let all_ints = points
        .iter()
        .all(|point| matches!(point.value, PointValue::Int(_)));

    let contents = match spec.datatype {
        TensorDataType::Int64 => {
            if !all_ints {
                return Err(EncodeError::Narrowing {
                    input: spec.name.clone(),
                    from: "FP64",
                    to: spec.datatype.wire_name().to_string(),
                });
            }
            InferTensorContents {
                int64_contents: points
                    .iter()
                    .map(|point| match point.value {
                        PointValue::Int(value) => value,
                        PointValue::Double(value) => value as i64,
                    })
                    .collect(),
                ..InferTensorContents::default()
            }
        }
        TensorDataType::Fp64 => InferTensorContents {
            // Integer points widen losslessly into a double tensor.
            fp64_contents: points
                .iter()
                .map(|point| match point.value {
                    PointValue::Int(value) => value as f64,
                    PointValue::Double(value) => value,
                })
                .collect(),
            ..InferTensorContents::default()
        },
        other => {
            return Err(EncodeError::Narrowing {
                input: spec.name.clone(),
                from: if all_ints { "INT64" } else { "FP64" },
                to: other.wire_name().to_string(),
            });
        }
    };

    Ok(InferInputTensor {
        name: spec.name.clone(),
        datatype: spec.datatype.wire_name().to_string(),
        shape,
        parameters: std::collections::HashMap::new(),
        contents: Some(contents),
    })
}

/// Resolves the declared shape against the group's point count: the product
/// of positive dimensions must equal the count, or a single -1 dimension
/// absorbs the residue.
fn resolve_shape(spec: &TensorSpec, points: usize) -> Result<Vec<i64>, EncodeError> {
    let dynamic_dims = spec.shape.iter().filter(|dim| **dim < 0).count();
    if dynamic_dims > 1 {
        return Err(EncodeError::UnresolvedShape {
            input: spec.name.clone(),
            shape: spec.shape.clone(),
        });
    }

    let positive_product: i64 = spec.shape.iter().filter(|dim| **dim > 0).product();
    let points_i64 = points as i64;

    if dynamic_dims == 0 {
        // An empty shape denotes a rank-0 scalar; its element count is one.
        if positive_product != points_i64 {
            return Err(EncodeError::ShapeMismatch {
                input: spec.name.clone(),
                shape: spec.shape.clone(),
                points,
            });
        }
        return Ok(spec.shape.clone());
    }

    if positive_product == 0 || points_i64 % positive_product != 0 {
        return Err(EncodeError::ShapeMismatch {
            input: spec.name.clone(),
            shape: spec.shape.clone(),
            points,
        });
    }
    let residue = points_i64 / positive_product;
    Ok(spec
        .shape
        .iter()
        .map(|dim| if *dim < 0 { residue } else { *dim })
        .collect())
}
