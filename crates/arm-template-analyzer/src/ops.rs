//! Leaf Operators
//!
//! The primitive predicates a `Leaf` expression evaluates once the JSON Path
//! Resolver has produced a concrete sub-document. Each operator takes the
//! resolved value (possibly the `Missing` sentinel) and an operand taken
//! verbatim from the rule JSON, and returns a bool. Universal quantification
//! over multiple resolver matches (the `[*]` case) is handled one level up,
//! in the expression tree - this module only ever judges a single value.

use crate::path::Resolved;
use serde_json::Value;
use std::sync::OnceLock;

/// The closed set of leaf predicates the rule DSL supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    HasValue,
    Exists,
    In,
    Regex,
    Greater,
    GreaterOrEquals,
    Less,
    LessOrEquals,
}

/// Deep structural equality with case-insensitive string comparison at
/// every level.
fn deep_eq_ci(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => sa.eq_ignore_ascii_case(sb),
        (Value::Array(va), Value::Array(vb)) => {
            va.len() == vb.len() && va.iter().zip(vb).all(|(x, y)| deep_eq_ci(x, y))
        }
        (Value::Object(oa), Value::Object(ob)) => {
            oa.len() == ob.len()
                && oa
                    .iter()
                    .all(|(k, v)| ob.iter().any(|(k2, v2)| k.eq_ignore_ascii_case(k2) && deep_eq_ci(v, v2)))
        }
        _ => a == b,
    }
}

fn is_empty_container(v: &Value) -> bool {
    match v {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Per the spec's Open Question resolution: empty string/array/object all
/// count as "no value", same as null or missing.
fn has_value(actual: &Resolved) -> bool {
    match actual {
        Resolved::Missing => false,
        Resolved::Value(Value::Null) => false,
        Resolved::Value(v) => !is_empty_container(v),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compiled_regex_cache() -> &'static std::sync::Mutex<std::collections::HashMap<String, regex::Regex>> {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, regex::Regex>>> =
        OnceLock::new();
    CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()))
}

fn regex_full_match(pattern: &str, text: &str) -> bool {
    let anchored = if pattern.starts_with('^') && pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})$")
    };
    let cache = compiled_regex_cache();
    let mut guard = cache.lock().expect("regex cache mutex poisoned");
    if let Some(re) = guard.get(&anchored) {
        return re.is_match(text);
    }
    match regex::Regex::new(&anchored) {
        Ok(re) => {
            let matched = re.is_match(text);
            guard.insert(anchored, re);
            matched
        }
        Err(_) => false,
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate one leaf predicate against a single resolved value.
pub fn evaluate(operator: Operator, actual: &Resolved, operand: &Value) -> bool {
    match operator {
        Operator::Equals => match actual {
            Resolved::Missing => false,
            Resolved::Value(v) => deep_eq_ci(v, operand),
        },
        Operator::NotEquals => match actual {
            Resolved::Missing => true,
            Resolved::Value(v) => !deep_eq_ci(v, operand),
        },
        Operator::HasValue => {
            let want = operand.as_bool().unwrap_or(true);
            has_value(actual) == want
        }
        Operator::Exists => {
            let present = !matches!(actual, Resolved::Missing);
            let want = operand.as_bool().unwrap_or(true);
            present == want
        }
        Operator::In => match (actual, operand.as_array()) {
            (Resolved::Value(v), Some(items)) => items.iter().any(|item| deep_eq_ci(v, item)),
            _ => false,
        },
        Operator::Regex => {
            let Some(pattern) = operand.as_str() else {
                return false;
            };
            match actual {
                Resolved::Missing => false,
                Resolved::Value(v) => regex_full_match(pattern, &stringify(v)),
            }
        }
        Operator::Greater | Operator::GreaterOrEquals | Operator::Less | Operator::LessOrEquals => {
            let (Resolved::Value(v), Some(rhs)) = (actual, as_f64(operand)) else {
                return false;
            };
            let Some(lhs) = as_f64(v) else {
                return false;
            };
            match operator {
                Operator::Greater => lhs > rhs,
                Operator::GreaterOrEquals => lhs >= rhs,
                Operator::Less => lhs < rhs,
                Operator::LessOrEquals => lhs <= rhs,
                _ => unreachable!(),
            }
        }
    }
}
