//! Placeholder parameter generation.
//!
//! For every declared template parameter without a supplied value, generate
//! a deterministic value satisfying its declared type and constraints. A
//! naive empty-string default breaks any rule that regex-matches a name, so
//! placeholders honor `minLength`/`maxLength`/`allowedValues` and special-case
//! a handful of commonly named parameters the way the spec calls out.

use serde_json::{Map, Value};

fn known_pattern(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "location" => Some("eastus"),
        "environment" => Some("dev"),
        "region" => Some("eastus"),
        _ => None,
    }
}

fn pad_to(base: &str, min_len: usize, max_len: Option<usize>) -> String {
    let mut s = base.to_string();
    while s.chars().count() < min_len {
        s.push('x');
    }
    if let Some(max) = max_len {
        if s.chars().count() > max {
            s = s.chars().take(max).collect();
        }
    }
    s
}

fn string_placeholder(param_name: &str, def: &Value) -> Value {
    if let Some(allowed) = def.get("allowedValues").and_then(Value::as_array) {
        if let Some(first) = allowed.first() {
            return first.clone();
        }
    }
    let min_len = def.get("minLength").and_then(Value::as_u64).unwrap_or(0) as usize;
    let max_len = def.get("maxLength").and_then(Value::as_u64).map(|n| n as usize);

    let base = known_pattern(param_name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("placeholder{}", sanitize(param_name)));

    Value::String(pad_to(&base, min_len.max(1), max_len))
}

fn sanitize(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase()
}

fn int_placeholder(def: &Value) -> Value {
    if let Some(allowed) = def.get("allowedValues").and_then(Value::as_array) {
        if let Some(first) = allowed.first() {
            return first.clone();
        }
    }
    Value::from(def.get("minValue").and_then(Value::as_i64).unwrap_or(0))
}

/// Generate a deterministic placeholder for one declared parameter.
pub fn generate(param_name: &str, def: &Value) -> Value {
    match def.get("type").and_then(Value::as_str).unwrap_or("string").to_ascii_lowercase().as_str() {
        "securestring" | "string" => string_placeholder(param_name, def),
        "int" => int_placeholder(def),
        "bool" => Value::Bool(false),
        "array" => Value::Array(Vec::new()),
        "object" | "secureobject" => Value::Object(Map::new()),
        _ => string_placeholder(param_name, def),
    }
}

/// Build the full placeholder parameter map from a template's declared
/// `parameters` section (`{ name: { type, ... } }`).
pub fn generate_all(declared: &Map<String, Value>) -> Map<String, Value> {
    declared.iter().map(|(name, def)| (name.clone(), generate(name, def))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn honors_min_length() {
        let def = json!({"type": "string", "minLength": 8});
        let value = generate("storageName", &def);
        assert!(value.as_str().unwrap().len() >= 8);
    }

    #[test]
    fn prefers_allowed_values() {
        let def = json!({"type": "string", "allowedValues": ["Standard_LRS", "Standard_GRS"]});
        assert_eq!(generate("skuName", &def), json!("Standard_LRS"));
    }

    #[test]
    fn is_deterministic_per_name() {
        let def = json!({"type": "string", "minLength": 3});
        assert_eq!(generate("storageName", &def), generate("storageName", &def));
    }

    #[test]
    fn known_location_parameter() {
        let def = json!({"type": "string"});
        assert_eq!(generate("location", &def), json!("eastus"));
    }

    #[test]
    fn default_values_for_other_types() {
        assert_eq!(generate("flag", &json!({"type": "bool"})), json!(false));
        assert_eq!(generate("items", &json!({"type": "array"})), json!([]));
        assert_eq!(generate("cfg", &json!({"type": "object"})), json!({}));
    }
}
