// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Resource description attached to every exported batch.

use super::super::common::v1::KeyValue;

/// The entity producing telemetry, described as a set of attributes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    /// Resource attributes, e.g. `host.name` or `service.name`.
    #[prost(message, repeated, tag = "1")]
    pub attributes: Vec<KeyValue>,
    /// Number of attributes dropped due to collection limits.
    #[prost(uint32, tag = "2")]
    pub dropped_attributes_count: u32,
}
