// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Input location and attribute-keyed grouping across a metrics batch.
//!
//! For each rule the matcher walks the resource → scope → metric tree,
//! collects the data points satisfying every input selector, and correlates
//! them into groups sharing a common attribute-value tuple. The group-key
//! space is the intersection of the attribute-name sets of the matched
//! inputs; when that intersection is empty the rule degrades to a single
//! group carrying every selected point per input ("vector mode"). Groups are
//! ordered by their serialized key so emitted outputs are stable across runs.

use crate::config::Rule;
use crate::error::RuleError;
use crate::pdata::opentelemetry::common::v1::AnyValue;
use crate::pdata::opentelemetry::metrics::v1::{Metric, MetricsData, NumberDataPoint, metric::Data,
    number_data_point::Value as NumberValue};
use crate::selector::attribute_text;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A scalar measurement selected from the batch, detached from its storage.
#[derive(Debug, Clone)]
pub(crate) struct MatchedPoint {
    /// The numeric value.
    pub value: PointValue,
    /// Sampling time of the point.
    pub time_unix_nano: u64,
    /// The point's attributes as (key, value, text) triples. The text form
    /// drives selector matching and group keying; the original value is
    /// preserved for propagation onto emitted points.
    pub attrs: Vec<(String, AnyValue, String)>,
}

impl MatchedPoint {
    fn attr_text(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _, _)| k == key)
            .map(|(_, _, text)| text.as_str())
    }

    fn sort_token(&self) -> String {
        let mut token = String::new();
        for (key, _, text) in &self.attrs {
            token.push_str(key);
            token.push('=');
            token.push_str(text);
            token.push(',');
        }
        token
    }
}

/// The numeric representations a selected point can carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PointValue {
    /// An integer point (`asInt`).
    Int(i64),
    /// A double point (`asDouble`).
    Double(f64),
}

/// Position of a scope within the batch tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopePath {
    pub resource: usize,
    pub scope: usize,
}

/// The result of locating a rule's inputs in a batch.
#[derive(Debug)]
pub(crate) struct MatchedRule {
    /// Selected points per input, in rule order.
    pub inputs: Vec<Vec<MatchedPoint>>,
    /// Scope of the first matched input metric; emitted metrics land here.
    pub scope_path: ScopePath,
}

/// A correlated set of points sharing one attribute-value tuple.
#[derive(Debug)]
pub(crate) struct Group {
    /// The group key as sorted (name, text value) pairs. Empty in vector mode.
    pub key: Vec<(String, String)>,
    /// The serialized key, used for ordering and log context.
    pub serialized_key: String,
    /// Points per input, in rule order. Exactly one point per input in keyed
    /// mode; every selected point in vector mode.
    pub per_input: Vec<Vec<MatchedPoint>>,
}

/// Counts of groups dropped during correlation.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct GroupStats {
    /// Groups where an input contributed more than one point.
    pub ambiguous: usize,
    /// Groups where an input contributed no point.
    pub incomplete: usize,
}

/// Locates every rule input in the batch. Fails with
/// [`RuleError::MissingInput`] when any selector matches no points.
pub(crate) fn match_rule(batch: &MetricsData, rule: &Rule) -> Result<MatchedRule, RuleError> {
    let mut inputs = Vec::with_capacity(rule.inputs.len());
    let mut scope_path = None;

    for selector in &rule.inputs {
        let mut points = Vec::new();
        for (resource_index, resource) in batch.resource_metrics.iter().enumerate() {
            for (scope_index, scope) in resource.scope_metrics.iter().enumerate() {
                for metric in &scope.metrics {
                    if metric.name != selector.metric_name {
                        continue;
                    }
                    let Some(data_points) = number_points(metric) else {
                        warn!(
                            metric = %metric.name,
                            rule = rule.index,
                            "input metric has no number data points; only gauge and sum inputs are supported"
                        );
                        continue;
                    };
                    let before = points.len();
                    for point in data_points {
                        if selector.matches_attributes(&point.attributes) {
                            if let Some(matched) = to_matched_point(point) {
                                points.push(matched);
                            }
                        }
                    }
                    if points.len() > before && scope_path.is_none() {
                        scope_path = Some(ScopePath {
                            resource: resource_index,
                            scope: scope_index,
                        });
                    }
                }
            }
        }

        if points.is_empty() {
            return Err(RuleError::MissingInput {
                selector: selector.to_string(),
            });
        }
        inputs.push(points);
    }

    Ok(MatchedRule {
        inputs,
        // A rule with matched inputs always has a scope path; the fallback is
        // unreachable but keeps the type total.
        scope_path: scope_path.unwrap_or(ScopePath {
            resource: 0,
            scope: 0,
        }),
    })
}

/// Correlates matched points into deterministic, attribute-keyed groups.
pub(crate) fn group_points(rule: &Rule, matched: &MatchedRule) -> (Vec<Group>, GroupStats) {
    let mut stats = GroupStats::default();

    // Group-key space: intersection of attribute-name sets across inputs.
    let mut key_space: Option<BTreeSet<&str>> = None;
    for input in &matched.inputs {
        let names: BTreeSet<&str> = input
            .iter()
            .flat_map(|point| point.attrs.iter().map(|(key, _, _)| key.as_str()))
            .collect();
        key_space = Some(match key_space {
            None => names,
            Some(space) => space.intersection(&names).copied().collect(),
        });
    }
    let key_space = key_space.unwrap_or_default();

    if key_space.is_empty() {
        // Vector mode: no common attributes to correlate on. All selected
        // points form a single group, ordered by time then attributes.
        let per_input = matched
            .inputs
            .iter()
            .map(|input| {
                let mut points = input.clone();
                points.sort_by(|a, b| {
                    a.time_unix_nano
                        .cmp(&b.time_unix_nano)
                        .then_with(|| a.sort_token().cmp(&b.sort_token()))
                });
                points
            })
            .collect();
        return (
            vec![Group {
                key: Vec::new(),
                serialized_key: String::new(),
                per_input,
            }],
            stats,
        );
    }

    // Bucket points by their projected key, per input.
    let mut buckets: BTreeMap<String, Vec<Vec<MatchedPoint>>> = BTreeMap::new();
    for (input_index, input) in matched.inputs.iter().enumerate() {
        for point in input {
            let Some(key) = project_key(point, &key_space) else {
                // The point lacks one of the common keys and cannot join any
                // group.
                continue;
            };
            let serialized = serialize_key(&key);
            let slot = buckets
                .entry(serialized)
                .or_insert_with(|| vec![Vec::new(); matched.inputs.len()]);
            slot[input_index].push(point.clone());
        }
    }

    let mut groups = Vec::new();
    for (serialized_key, per_input) in buckets {
        if per_input.iter().any(Vec::is_empty) {
            stats.incomplete += 1;
            debug!(
                rule = rule.index,
                group = %serialized_key,
                "group dropped: not every input contributed a point"
            );
            continue;
        }
        if per_input.iter().any(|points| points.len() > 1) {
            stats.ambiguous += 1;
            warn!(
                rule = rule.index,
                group = %serialized_key,
                "group dropped: an input contributed more than one point"
            );
            continue;
        }
        let key = per_input[0][0]
            .attrs
            .iter()
            .filter(|(name, _, _)| key_space.contains(name.as_str()))
            .map(|(name, _, text)| (name.clone(), text.clone()))
            .collect();
        groups.push(Group {
            key,
            serialized_key,
            per_input,
        });
    }

    (groups, stats)
}

fn project_key(point: &MatchedPoint, key_space: &BTreeSet<&str>) -> Option<Vec<(String, String)>> {
    key_space
        .iter()
        .map(|name| {
            point
                .attr_text(name)
                .map(|text| ((*name).to_string(), text.to_string()))
        })
        .collect()
}

fn serialize_key(key: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (name, value)) in key.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// The number data points of a gauge or sum metric; `None` for histogram,
/// exponential histogram and summary data.
fn number_points(metric: &Metric) -> Option<&[NumberDataPoint]> {
    match metric.data.as_ref()? {
        Data::Gauge(gauge) => Some(&gauge.data_points),
        Data::Sum(sum) => Some(&sum.data_points),
        Data::Histogram(_) | Data::ExponentialHistogram(_) | Data::Summary(_) => None,
    }
}

fn to_matched_point(point: &NumberDataPoint) -> Option<MatchedPoint> {
    let value = match point.value? {
        NumberValue::AsDouble(value) => PointValue::Double(value),
        NumberValue::AsInt(value) => PointValue::Int(value),
    };
    let mut attrs = Vec::with_capacity(point.attributes.len());
    for attribute in &point.attributes {
        let Some(any_value) = attribute.value.as_ref() else {
            continue;
        };
        let Some(text) = attribute_text(any_value) else {
            // Composite attribute values cannot participate in grouping.
            continue;
        };
        attrs.push((attribute.key.clone(), any_value.clone(), text));
    }
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    Some(MatchedPoint {
        value,
        time_unix_nano: point.time_unix_nano,
        attrs,
    })
}
