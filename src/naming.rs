// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Heuristic output-metric naming, used when a rule declares no
//! `output_pattern`.
//!
//! Input metric names are stemmed (`system.cpu.utilization` → `cpu_utilization`),
//! concatenated, and suffixed with the output's configured name. Rules with
//! many inputs collapse to per-category counts (`cpu2_mem2`) so emitted names
//! stay readable. The result is a pure function of the rule, so names are
//! stable across batches and across runs.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Tuning knobs for the intelligent naming heuristic.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// Maximum number of trailing name parts kept per input stem.
    #[serde(default = "default_max_stem_parts")]
    pub max_stem_parts: usize,

    /// Leading domain tokens stripped from input names before stemming.
    /// An empty list disables stripping.
    #[serde(default = "default_skip_common_domains")]
    pub skip_common_domains: Vec<String>,

    /// Whether rules with many inputs abbreviate to category counts.
    #[serde(default = "default_enable_category_grouping")]
    pub enable_category_grouping: bool,

    /// Minimum input count at which category abbreviation kicks in.
    #[serde(default = "default_abbreviation_threshold")]
    pub abbreviation_threshold: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_stem_parts: default_max_stem_parts(),
            skip_common_domains: default_skip_common_domains(),
            enable_category_grouping: default_enable_category_grouping(),
            abbreviation_threshold: default_abbreviation_threshold(),
        }
    }
}

const fn default_max_stem_parts() -> usize {
    2
}

fn default_skip_common_domains() -> Vec<String> {
    vec![
        "system".to_string(),
        "app".to_string(),
        "process".to_string(),
    ]
}

const fn default_enable_category_grouping() -> bool {
    true
}

const fn default_abbreviation_threshold() -> usize {
    4
}

impl NamingConfig {
    /// Derives the emitted metric name for one output of a rule without an
    /// output pattern.
    #[must_use]
    pub fn derive_name(&self, inputs: &[&str], model_name: &str, output_name: &str) -> String {
        if inputs.is_empty() {
            if model_name.is_empty() {
                return output_name.to_string();
            }
            return format!("{model_name}.{output_name}");
        }

        let stems: Vec<Vec<&str>> = inputs.iter().map(|name| self.stem_parts(name)).collect();

        let prefix = if self.enable_category_grouping && inputs.len() >= self.abbreviation_threshold
        {
            self.abbreviate(&stems)
        } else {
            stems
                .iter()
                .map(|parts| parts.join("_"))
                .collect::<Vec<_>>()
                .join("_")
        };

        format!("{prefix}.{output_name}")
    }

    /// Splits an input name on `.`, drops a leading domain token, and keeps
    /// at most `max_stem_parts` trailing parts.
    fn stem_parts<'a>(&self, name: &'a str) -> Vec<&'a str> {
        let mut parts: Vec<&str> = name.split('.').filter(|p| !p.is_empty()).collect();
        if parts.len() > 1 {
            if let Some(first) = parts.first() {
                if self.skip_common_domains.iter().any(|d| d == first) {
                    let _ = parts.remove(0);
                }
            }
        }
        let keep = self.max_stem_parts.max(1);
        if parts.len() > keep {
            parts.split_off(parts.len() - keep)
        } else {
            parts
        }
    }

    /// Collapses stems into `<category><count>` segments sorted by category.
    fn abbreviate(&self, stems: &[Vec<&str>]) -> String {
        let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
        for parts in stems {
            let category = parts.first().copied().unwrap_or_default();
            *categories.entry(category).or_insert(0) += 1;
        }
        categories
            .iter()
            .map(|(category, count)| format!("{category}{count}"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_and_appends_output_name() {
        let cfg = NamingConfig::default();
        assert_eq!(
            cfg.derive_name(&["system.cpu.utilization"], "cpu_prediction", "prediction"),
            "cpu_utilization.prediction"
        );
    }

    #[test]
    fn keeps_short_names_intact() {
        let cfg = NamingConfig::default();
        assert_eq!(cfg.derive_name(&["requests"], "m", "rate"), "requests.rate");
    }

    #[test]
    fn joins_multiple_inputs_with_underscores() {
        let cfg = NamingConfig::default();
        assert_eq!(
            cfg.derive_name(
                &["system.cpu.utilization", "system.memory.usage"],
                "m",
                "score"
            ),
            "cpu_utilization_memory_usage.score"
        );
    }

    #[test]
    fn domain_stripping_is_configurable() {
        let cfg = NamingConfig {
            skip_common_domains: Vec::new(),
            ..NamingConfig::default()
        };
        assert_eq!(
            cfg.derive_name(&["system.cpu.utilization"], "m", "p"),
            // Without stripping, the trailing two parts survive unchanged.
            "cpu_utilization.p"
        );
        assert_eq!(cfg.derive_name(&["system.cpu"], "m", "p"), "system_cpu.p");
    }

    #[test]
    fn abbreviates_many_inputs_by_category() {
        let cfg = NamingConfig::default();
        let inputs = [
            "system.cpu.utilization",
            "system.cpu.load_average",
            "system.memory.usage",
            "system.memory.utilization",
        ];
        assert_eq!(
            cfg.derive_name(&inputs, "m", "anomaly"),
            "cpu2_memory2.anomaly"
        );
    }

    #[test]
    fn abbreviation_respects_threshold_and_toggle() {
        let cfg = NamingConfig {
            abbreviation_threshold: 10,
            ..NamingConfig::default()
        };
        let inputs = [
            "system.cpu.utilization",
            "system.cpu.load_average",
            "system.memory.usage",
            "system.memory.utilization",
        ];
        assert_eq!(
            cfg.derive_name(&inputs, "m", "anomaly"),
            "cpu_utilization_cpu_load_average_memory_usage_memory_utilization.anomaly"
        );

        let cfg = NamingConfig {
            enable_category_grouping: false,
            ..NamingConfig::default()
        };
        assert!(!cfg.derive_name(&inputs, "m", "anomaly").contains("cpu2"));
    }

    #[test]
    fn falls_back_without_inputs() {
        let cfg = NamingConfig::default();
        assert_eq!(cfg.derive_name(&[], "cpu_prediction", "p"), "cpu_prediction.p");
        assert_eq!(cfg.derive_name(&[], "", "p"), "p");
    }

    #[test]
    fn max_stem_parts_bounds_the_tail() {
        let cfg = NamingConfig {
            max_stem_parts: 1,
            ..NamingConfig::default()
        };
        assert_eq!(
            cfg.derive_name(&["system.cpu.utilization"], "m", "p"),
            "utilization.p"
        );
    }
}
