//! Rule Catalog
//!
//! Deserializes the rule JSON array, validates each rule object against a
//! JSON Schema, then compiles its `evaluation` field into an
//! [`crate::expr::Expression`] tree - validate, then compile.

use crate::config::RuleFilterConfig;
use crate::error::{AnalyzerError, Result};
use crate::expr::Expression;
use serde_json::Value;
use std::sync::OnceLock;

/// A single catalog entry: metadata plus a compiled expression tree.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub description: String,
    pub recommendation: String,
    pub help_uri: String,
    /// 1..4, smaller is more severe. Mutable post-load via `filter`.
    pub severity: u8,
    pub evaluation: Expression,
}

fn schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        serde_json::json!({
            "type": "object",
            "required": ["id", "description", "severity", "evaluation"],
            "properties": {
                "id": { "type": "string", "minLength": 1 },
                "description": { "type": "string" },
                "recommendation": { "type": "string" },
                "helpUri": { "type": "string" },
                "severity": { "type": "integer", "minimum": 1, "maximum": 4 },
                "evaluation": { "type": "object" }
            }
        })
    })
}

fn validator() -> &'static jsonschema::Validator {
    static VALIDATOR: OnceLock<jsonschema::Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        jsonschema::validator_for(schema()).expect("rule catalog schema is valid at compile time")
    })
}

/// Parse a JSON array of rule objects, validating and compiling each one.
/// Aborts on the first rule that fails schema validation or whose
/// `evaluation` fails to compile, naming the offending rule id. Also aborts
/// on a duplicate `id` within the catalog.
pub fn load(raw_json: &str) -> Result<Vec<RuleDefinition>> {
    let parsed: Value = serde_json::from_str(raw_json)
        .map_err(|e| AnalyzerError::CatalogParse { rule_id: "<unknown>".to_string(), message: e.to_string() })?;
    let entries = parsed.as_array().ok_or_else(|| AnalyzerError::CatalogParse {
        rule_id: "<unknown>".to_string(),
        message: "rule catalog must be a JSON array".to_string(),
    })?;

    let rules: Vec<RuleDefinition> = entries.iter().map(compile_rule).collect::<Result<_>>()?;

    let mut seen_ids = std::collections::HashSet::new();
    for rule in &rules {
        if !seen_ids.insert(rule.id.as_str()) {
            return Err(AnalyzerError::CatalogParse {
                rule_id: rule.id.clone(),
                message: "duplicate rule id in catalog".to_string(),
            });
        }
    }

    Ok(rules)
}

fn compile_rule(value: &Value) -> Result<RuleDefinition> {
    let probable_id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();

    if let Err(error) = validator().validate(value) {
        return Err(AnalyzerError::CatalogParse {
            rule_id: probable_id,
            message: error.to_string(),
        });
    }

    let id = value["id"].as_str().unwrap().to_string();
    let description = value.get("description").and_then(Value::as_str).unwrap_or("").to_string();
    let recommendation = value.get("recommendation").and_then(Value::as_str).unwrap_or("").to_string();
    let help_uri = value.get("helpUri").and_then(Value::as_str).unwrap_or("").to_string();
    let severity = value["severity"].as_u64().unwrap_or(4) as u8;

    let evaluation = Expression::from_json(&value["evaluation"]).map_err(|message| AnalyzerError::CatalogParse {
        rule_id: id.clone(),
        message,
    })?;

    Ok(RuleDefinition {
        id,
        description,
        recommendation,
        help_uri,
        severity,
        evaluation,
    })
}

/// Apply inclusion/exclusion filtering, then severity overrides to the
/// survivors. Both steps are pure; `catalog` is left untouched.
pub fn filter(catalog: &[RuleDefinition], config: &RuleFilterConfig) -> Vec<RuleDefinition> {
    catalog
        .iter()
        .filter(|rule| config.keeps(&rule.id, rule.severity))
        .cloned()
        .map(|mut rule| {
            if let Some(overridden) = config.override_severity(&rule.id) {
                rule.severity = overridden;
            }
            rule
        })
        .collect()
}
