//! The ARM function library seam.
//!
//! The spec treats the standard ARM function set as "host-provided" with
//! only a signature. [`ArmFunctionLibrary`] is that signature; the engine
//! never calls a specific function by name outside this trait, so a host
//! can swap in a richer implementation (e.g. one backed by the real Azure
//! deployment engine) without touching [`crate::armexpr`].

use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Name/variable/reference lookups a function body may need.
pub struct Scopes<'a> {
    pub parameters: &'a Map<String, Value>,
    pub variables: &'a Map<String, Value>,
    /// Resources keyed by their literal name, for `reference()`.
    pub resources_by_name: &'a HashMap<String, Value>,
    pub copy_index: Option<i64>,
}

/// `evaluate(fn_name, args, scopes) -> JsonValue`, fallible so an unknown
/// function or wrong arity reports a recoverable error instead of panicking.
pub trait ArmFunctionLibrary {
    fn evaluate(&self, fn_name: &str, args: &[Value], scopes: &Scopes) -> Result<Value, String>;
}

/// A default implementation covering the functions the spec names by
/// example. Callers needing the full ARM surface can wrap or replace this.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardArmFunctions;

fn as_str<'a>(v: &'a Value, fn_name: &str) -> Result<&'a str, String> {
    v.as_str().ok_or_else(|| format!("{fn_name}: expected a string argument"))
}

fn as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl ArmFunctionLibrary for StandardArmFunctions {
    fn evaluate(&self, fn_name: &str, args: &[Value], scopes: &Scopes) -> Result<Value, String> {
        match fn_name {
            "concat" => {
                if !args.is_empty() && args.iter().all(Value::is_array) {
                    let mut out = Vec::new();
                    for a in args {
                        out.extend(a.as_array().unwrap().iter().cloned());
                    }
                    Ok(Value::Array(out))
                } else {
                    let mut out = String::new();
                    for a in args {
                        out.push_str(&stringify(a));
                    }
                    Ok(Value::String(out))
                }
            }
            "resourceId" => {
                let parts: Vec<String> = args.iter().map(stringify).collect();
                Ok(Value::String(format!(
                    "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/placeholder/providers/{}",
                    parts.join("/")
                )))
            }
            "parameters" => {
                let name = as_str(args.first().ok_or("parameters: missing name argument")?, fn_name)?;
                scopes
                    .parameters
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("parameters: unknown parameter `{name}`"))
            }
            "variables" => {
                let name = as_str(args.first().ok_or("variables: missing name argument")?, fn_name)?;
                scopes
                    .variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("variables: unknown variable `{name}`"))
            }
            "reference" => {
                let name = as_str(args.first().ok_or("reference: missing name argument")?, fn_name)?;
                match scopes.resources_by_name.get(name) {
                    Some(resource) => Ok(resource.get("properties").cloned().unwrap_or(Value::Null)),
                    None => {
                        tracing::warn!(resource = name, "reference() target not found, skipping");
                        Err(format!("reference: unknown resource `{name}`"))
                    }
                }
            }
            "copyIndex" => {
                let offset = match args.first() {
                    Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
                    _ => 0,
                };
                scopes
                    .copy_index
                    .map(|i| Value::from(i + offset))
                    .ok_or_else(|| "copyIndex: not inside a copy loop".to_string())
            }
            "if" => {
                let cond = args.first().ok_or("if: missing condition")?;
                let when_true = args.get(1).ok_or("if: missing true branch")?;
                let when_false = args.get(2).ok_or("if: missing false branch")?;
                Ok(if as_bool(cond) { when_true.clone() } else { when_false.clone() })
            }
            "equals" => {
                let a = args.first().ok_or("equals: missing first argument")?;
                let b = args.get(1).ok_or("equals: missing second argument")?;
                Ok(Value::Bool(values_equal_ci(a, b)))
            }
            "and" => Ok(Value::Bool(args.iter().all(as_bool))),
            "or" => Ok(Value::Bool(args.iter().any(as_bool))),
            "not" => Ok(Value::Bool(!as_bool(args.first().ok_or("not: missing argument")?))),
            "uniqueString" => {
                let mut hasher = DefaultHasher::new();
                for a in args {
                    stringify(a).hash(&mut hasher);
                }
                Ok(Value::String(format!("{:013x}", hasher.finish() & 0xF_FFFF_FFFF_FFFF)))
            }
            "toLower" => Ok(Value::String(as_str(args.first().ok_or("toLower: missing argument")?, fn_name)?.to_lowercase())),
            "toUpper" => Ok(Value::String(as_str(args.first().ok_or("toUpper: missing argument")?, fn_name)?.to_uppercase())),
            "length" => {
                let v = args.first().ok_or("length: missing argument")?;
                let len = match v {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    other => return Err(format!("length: unsupported value {other}")),
                };
                Ok(Value::from(len as u64))
            }
            "union" => union_values(args),
            "array" => {
                if args.len() == 1 {
                    Ok(Value::Array(vec![args[0].clone()]))
                } else {
                    Ok(Value::Array(args.to_vec()))
                }
            }
            other => Err(format!("unsupported ARM function `{other}`")),
        }
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal_ci(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => sa.eq_ignore_ascii_case(sb),
        _ => a == b,
    }
}

fn union_values(args: &[Value]) -> Result<Value, String> {
    if args.iter().all(Value::is_object) {
        let mut merged = Map::new();
        for a in args {
            for (k, v) in a.as_object().unwrap() {
                merged.insert(k.clone(), v.clone());
            }
        }
        Ok(Value::Object(merged))
    } else if args.iter().all(Value::is_array) {
        let mut merged = Vec::new();
        for a in args {
            for item in a.as_array().unwrap() {
                if !merged.iter().any(|m| values_equal_ci(m, item)) {
                    merged.push(item.clone());
                }
            }
        }
        Ok(Value::Array(merged))
    } else {
        Err("union: arguments must be all arrays or all objects".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes<'a>(parameters: &'a Map<String, Value>, variables: &'a Map<String, Value>) -> Scopes<'a> {
        static EMPTY: std::sync::OnceLock<HashMap<String, Value>> = std::sync::OnceLock::new();
        Scopes {
            parameters,
            variables,
            resources_by_name: EMPTY.get_or_init(HashMap::new),
            copy_index: None,
        }
    }

    #[test]
    fn concat_joins_strings() {
        let params = Map::new();
        let vars = Map::new();
        let result = StandardArmFunctions
            .evaluate("concat", &[json!("a"), json!("b")], &scopes(&params, &vars))
            .unwrap();
        assert_eq!(result, json!("ab"));
    }

    #[test]
    fn concat_joins_arrays() {
        let params = Map::new();
        let vars = Map::new();
        let result = StandardArmFunctions
            .evaluate("concat", &[json!([1, 2]), json!([3])], &scopes(&params, &vars))
            .unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn parameters_looks_up_by_name() {
        let mut params = Map::new();
        params.insert("storageName".to_string(), json!("mystorage"));
        let vars = Map::new();
        let result = StandardArmFunctions
            .evaluate("parameters", &[json!("storageName")], &scopes(&params, &vars))
            .unwrap();
        assert_eq!(result, json!("mystorage"));
    }

    #[test]
    fn unique_string_is_deterministic() {
        let params = Map::new();
        let vars = Map::new();
        let s = scopes(&params, &vars);
        let a = StandardArmFunctions.evaluate("uniqueString", &[json!("x")], &s).unwrap();
        let b = StandardArmFunctions.evaluate("uniqueString", &[json!("x")], &s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equals_is_case_insensitive_for_strings() {
        let params = Map::new();
        let vars = Map::new();
        let result = StandardArmFunctions
            .evaluate("equals", &[json!("Foo"), json!("foo")], &scopes(&params, &vars))
            .unwrap();
        assert_eq!(result, json!(true));
    }
}
