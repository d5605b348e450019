//! Rule filter configuration.
//!
//! Inclusion/exclusion lists plus per-rule severity overrides for the rule
//! catalog. Loading this struct from a file or environment is host glue and
//! out of scope here - only the struct and its `filter` semantics are.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Keep only rules matching at least one of `severity` or `ids`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Inclusions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// Drop rules matching at least one of `severity` or `ids`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Exclusions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// `{ inclusions?, exclusions?, severityOverrides? }` as specified for the
/// rule catalog filter step. Inclusions and exclusions are mutually
/// exclusive; when both are present inclusions wins and exclusions is
/// ignored (an empty filter pass would otherwise be ambiguous).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusions: Option<Inclusions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<Exclusions>,
    #[serde(default, rename = "severityOverrides", skip_serializing_if = "HashMap::is_empty")]
    pub severity_overrides: HashMap<String, u8>,
}

impl RuleFilterConfig {
    /// True if `id`/`severity` survive the inclusion/exclusion step, ignoring
    /// overrides (applied separately, after filtering).
    pub fn keeps(&self, id: &str, severity: u8) -> bool {
        if let Some(inclusions) = &self.inclusions {
            let by_id = inclusions.ids.as_ref().is_some_and(|ids| ids.iter().any(|i| i == id));
            let by_severity = inclusions.severity.as_ref().is_some_and(|s| s.contains(&severity));
            return by_id || by_severity;
        }
        if let Some(exclusions) = &self.exclusions {
            let by_id = exclusions.ids.as_ref().is_some_and(|ids| ids.iter().any(|i| i == id));
            let by_severity = exclusions.severity.as_ref().is_some_and(|s| s.contains(&severity));
            return !(by_id || by_severity);
        }
        true
    }

    /// The overridden severity for `id`, if one was configured.
    pub fn override_severity(&self, id: &str) -> Option<u8> {
        self.severity_overrides.get(id).copied()
    }
}

/// Distinct rule ids referenced anywhere in the config, for diagnostics.
pub fn referenced_ids(config: &RuleFilterConfig) -> HashSet<&str> {
    let mut ids = HashSet::new();
    if let Some(inclusions) = &config.inclusions {
        if let Some(list) = &inclusions.ids {
            ids.extend(list.iter().map(String::as_str));
        }
    }
    if let Some(exclusions) = &config.exclusions {
        if let Some(list) = &exclusions.ids {
            ids.extend(list.iter().map(String::as_str));
        }
    }
    ids.extend(config.severity_overrides.keys().map(String::as_str));
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filters_keeps_everything() {
        let cfg = RuleFilterConfig::default();
        assert!(cfg.keeps("TA-000004", 2));
    }

    #[test]
    fn inclusion_by_severity() {
        let cfg = RuleFilterConfig {
            inclusions: Some(Inclusions {
                severity: Some(vec![1]),
                ids: None,
            }),
            ..Default::default()
        };
        assert!(cfg.keeps("TA-000004", 1));
        assert!(!cfg.keeps("TA-000004", 2));
    }

    #[test]
    fn exclusion_by_id() {
        let cfg = RuleFilterConfig {
            exclusions: Some(Exclusions {
                severity: None,
                ids: Some(vec!["TA-000004".to_string()]),
            }),
            ..Default::default()
        };
        assert!(!cfg.keeps("TA-000004", 2));
        assert!(cfg.keeps("TA-000005", 2));
    }

    #[test]
    fn filter_is_idempotent() {
        let cfg = RuleFilterConfig {
            exclusions: Some(Exclusions {
                severity: Some(vec![4]),
                ids: None,
            }),
            ..Default::default()
        };
        let once = cfg.keeps("TA-000004", 4);
        let twice = cfg.keeps("TA-000004", 4);
        assert_eq!(once, twice);
    }
}
