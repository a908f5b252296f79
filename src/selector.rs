// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Parser and matcher for `metric{key="value",...}` input selectors.
//!
//! A selector narrows a rule input to the data points of a named metric that
//! carry all of the listed attribute equalities. Values are double-quoted and
//! may contain commas; extra attributes on a point are ignored at match time.

use crate::error::SelectorError;
use crate::pdata::opentelemetry::common::v1::{AnyValue, KeyValue, any_value::Value};
use std::collections::BTreeMap;
use std::fmt;

/// A parsed input selector: a metric name plus required label equalities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelector {
    /// The exact metric name to match.
    pub metric_name: String,
    /// Required attribute equalities, keyed by attribute name.
    pub labels: BTreeMap<String, String>,
}

impl MetricSelector {
    /// Parses a selector from its textual form.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let input = input.trim();
        let Some(open) = input.find('{') else {
            if input.contains('}') {
                return Err(SelectorError::UnbalancedBraces);
            }
            if input.is_empty() {
                return Err(SelectorError::EmptyMetricName);
            }
            return Ok(Self {
                metric_name: input.to_string(),
                labels: BTreeMap::new(),
            });
        };

        let metric_name = input[..open].trim();
        if metric_name.is_empty() {
            return Err(SelectorError::EmptyMetricName);
        }
        let rest = &input[open + 1..];
        let Some(body) = rest.strip_suffix('}') else {
            return Err(SelectorError::UnbalancedBraces);
        };
        if body.contains(['{', '}']) {
            return Err(SelectorError::UnbalancedBraces);
        }

        let mut labels = BTreeMap::new();
        for pair in split_pairs(body) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some(eq) = pair.find('=') else {
                return Err(SelectorError::MissingEquals {
                    pair: pair.to_string(),
                });
            };
            let key = pair[..eq].trim();
            if key.is_empty() {
                return Err(SelectorError::EmptyKey {
                    pair: pair.to_string(),
                });
            }
            let value = pair[eq + 1..].trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| SelectorError::UnquotedValue {
                    pair: pair.to_string(),
                })?;
            let _ = labels.insert(key.to_string(), unquoted.to_string());
        }

        Ok(Self {
            metric_name: metric_name.to_string(),
            labels,
        })
    }

    /// True when every selector label is present on the point's attributes
    /// with an equal value.
    #[must_use]
    pub fn matches_attributes(&self, attributes: &[KeyValue]) -> bool {
        self.labels.iter().all(|(key, want)| {
            attributes.iter().any(|kv| {
                kv.key == *key
                    && kv
                        .value
                        .as_ref()
                        .and_then(attribute_text)
                        .is_some_and(|have| have == *want)
            })
        })
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_str(&self.metric_name);
        }
        write!(f, "{}{{", self.metric_name)?;
        for (i, (key, value)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}=\"{value}\"")?;
        }
        f.write_str("}")
    }
}

/// Splits a label block on commas, keeping commas inside quotes literal.
fn split_pairs(body: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs.push(&body[start..]);
    pairs
}

/// Renders an attribute value as the text used for selector matching and
/// group keying. Composite values (arrays, maps) have no text form.
pub(crate) fn attribute_text(value: &AnyValue) -> Option<String> {
    match value.value.as_ref()? {
        Value::StringValue(s) => Some(s.clone()),
        Value::BoolValue(b) => Some(b.to_string()),
        Value::IntValue(i) => Some(i.to_string()),
        Value::DoubleValue(d) => Some(d.to_string()),
        Value::ArrayValue(_) | Value::KvlistValue(_) | Value::BytesValue(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(Value::StringValue(value.to_string())),
            }),
        }
    }

    #[test]
    fn parses_bare_metric_name() {
        let sel = MetricSelector::parse("system.cpu.utilization").unwrap();
        assert_eq!(sel.metric_name, "system.cpu.utilization");
        assert!(sel.labels.is_empty());
    }

    #[test]
    fn parses_labels_and_trims_whitespace() {
        let sel = MetricSelector::parse(r#" system.cpu.utilization { cpu = "0" , state = "user" } "#)
            .unwrap();
        assert_eq!(sel.metric_name, "system.cpu.utilization");
        assert_eq!(sel.labels.get("cpu").map(String::as_str), Some("0"));
        assert_eq!(sel.labels.get("state").map(String::as_str), Some("user"));
    }

    #[test]
    fn preserves_commas_inside_quotes() {
        let sel = MetricSelector::parse(r#"m{tags="a,b,c",zone="eu"}"#).unwrap();
        assert_eq!(sel.labels.get("tags").map(String::as_str), Some("a,b,c"));
        assert_eq!(sel.labels.get("zone").map(String::as_str), Some("eu"));
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert_eq!(
            MetricSelector::parse("m{cpu=\"0\"").unwrap_err(),
            SelectorError::UnbalancedBraces
        );
        assert_eq!(
            MetricSelector::parse("m}cpu").unwrap_err(),
            SelectorError::UnbalancedBraces
        );
    }

    #[test]
    fn rejects_empty_metric_name() {
        assert_eq!(
            MetricSelector::parse("{cpu=\"0\"}").unwrap_err(),
            SelectorError::EmptyMetricName
        );
        assert_eq!(
            MetricSelector::parse("   ").unwrap_err(),
            SelectorError::EmptyMetricName
        );
    }

    #[test]
    fn rejects_pair_without_equals() {
        assert!(matches!(
            MetricSelector::parse("m{cpu}").unwrap_err(),
            SelectorError::MissingEquals { .. }
        ));
    }

    #[test]
    fn rejects_unquoted_value() {
        assert!(matches!(
            MetricSelector::parse("m{cpu=0}").unwrap_err(),
            SelectorError::UnquotedValue { .. }
        ));
    }

    #[test]
    fn matches_when_selector_labels_are_subset() {
        let sel = MetricSelector::parse(r#"m{cpu="0"}"#).unwrap();
        assert!(sel.matches_attributes(&[attr("cpu", "0"), attr("state", "user")]));
        assert!(!sel.matches_attributes(&[attr("cpu", "1")]));
        assert!(!sel.matches_attributes(&[attr("state", "user")]));
    }

    #[test]
    fn matches_non_string_attribute_values_by_text() {
        let sel = MetricSelector::parse(r#"m{cpu="4"}"#).unwrap();
        let attrs = [KeyValue {
            key: "cpu".to_string(),
            value: Some(AnyValue {
                value: Some(Value::IntValue(4)),
            }),
        }];
        assert!(sel.matches_attributes(&attrs));
    }

    #[test]
    fn display_round_trips() {
        let sel = MetricSelector::parse(r#"m{b="2",a="1"}"#).unwrap();
        assert_eq!(sel.to_string(), r#"m{a="1",b="2"}"#);
    }
}
