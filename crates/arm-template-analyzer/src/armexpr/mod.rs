//! ARM Expression Evaluator
//!
//! Parses and evaluates the ARM template language: strings of the form
//! `[fn(args)]` or `[expr]`, recursively over the whole JSON tree. A pest
//! grammar (`grammar.pest`) handles the call/member/index syntax; this
//! module walks the parse tree into a small [`Node`] AST and evaluates it
//! against a [`functions::Scopes`] using a pluggable [`functions::ArmFunctionLibrary`].
//!
//! Evaluation failures are swallowed per-node in [`EvaluationMode::Lenient`]
//! (the sentinel `NOT_PARSED` is substituted) or surfaced in
//! [`EvaluationMode::Strict`] - a caller-selectable mode sharing one code
//! path.

pub mod functions;

pub use functions::{ArmFunctionLibrary, Scopes, StandardArmFunctions};

use crate::error::{AnalyzerError, Result};
use pest::Parser;
use pest_derive::Parser;
use serde_json::{Map, Value};

#[derive(Parser)]
#[grammar = "armexpr/grammar.pest"]
struct ArmExprParser;

/// The sentinel substituted for a language expression that failed to
/// evaluate in lenient mode.
pub const NOT_PARSED: &str = "NOT_PARSED";

/// Whether a failed expression evaluation is swallowed (`Lenient`, the
/// default, matching the original's behavior) or surfaced (`Strict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone)]
enum Node {
    Number(f64),
    Str(String),
    Array(Vec<Node>),
    Ident(String),
    Call { name: String, args: Vec<Node> },
    Member { base: Box<Node>, name: String },
    Index { base: Box<Node>, index: Box<Node> },
}

fn unescape(raw: &str) -> String {
    raw.replace("''", "'")
}

fn build_value(pair: pest::iterators::Pair<Rule>) -> Node {
    let accessor = pair.into_inner().next().expect("value wraps one accessor");
    build_accessor(accessor)
}

fn build_accessor(pair: pest::iterators::Pair<Rule>) -> Node {
    let mut inner = pair.into_inner();
    let primary = inner.next().expect("accessor starts with a primary");
    let mut node = build_primary(primary);
    for suffix in inner {
        match suffix.as_rule() {
            Rule::member => {
                let name = suffix
                    .into_inner()
                    .next()
                    .expect("member wraps an identifier")
                    .as_str()
                    .to_string();
                node = Node::Member { base: Box::new(node), name };
            }
            Rule::index => {
                let value_pair = suffix.into_inner().next().expect("index wraps a value");
                node = Node::Index {
                    base: Box::new(node),
                    index: Box::new(build_value(value_pair)),
                };
            }
            other => unreachable!("unexpected accessor suffix {other:?}"),
        }
    }
    node
}

fn build_primary(pair: pest::iterators::Pair<Rule>) -> Node {
    let inner = pair.into_inner().next().expect("primary wraps one alternative");
    match inner.as_rule() {
        Rule::call => build_call(inner),
        Rule::string => {
            let raw = inner.into_inner().next().expect("string wraps string_inner").as_str();
            Node::Str(unescape(raw))
        }
        Rule::number => Node::Number(inner.as_str().parse().unwrap_or(0.0)),
        Rule::array => Node::Array(inner.into_inner().map(build_value).collect()),
        Rule::ident => Node::Ident(inner.as_str().to_string()),
        other => unreachable!("unexpected primary alternative {other:?}"),
    }
}

fn build_call(pair: pest::iterators::Pair<Rule>) -> Node {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("call starts with an identifier").as_str().to_string();
    let args = inner.map(build_value).collect();
    Node::Call { name, args }
}

fn parse(inner_text: &str) -> std::result::Result<Node, String> {
    let mut pairs = ArmExprParser::parse(Rule::expression, inner_text).map_err(|e| e.to_string())?;
    let expr_pair = pairs.next().expect("expression rule matched");
    let value_pair = expr_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::value)
        .ok_or_else(|| "empty expression".to_string())?;
    Ok(build_value(value_pair))
}

fn eval_node(node: &Node, scopes: &Scopes, lib: &dyn ArmFunctionLibrary) -> std::result::Result<Value, String> {
    match node {
        Node::Number(n) => Ok(serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)),
        Node::Str(s) => Ok(Value::String(s.clone())),
        Node::Ident(s) => Ok(Value::String(s.clone())),
        Node::Array(items) => {
            let values: std::result::Result<Vec<_>, _> = items.iter().map(|n| eval_node(n, scopes, lib)).collect();
            Ok(Value::Array(values?))
        }
        Node::Call { name, args } => {
            let values: std::result::Result<Vec<_>, _> = args.iter().map(|n| eval_node(n, scopes, lib)).collect();
            lib.evaluate(name, &values?, scopes)
        }
        Node::Member { base, name } => {
            let value = eval_node(base, scopes, lib)?;
            value
                .as_object()
                .and_then(|obj| obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone()))
                .ok_or_else(|| format!("no property `{name}` on resolved value"))
        }
        Node::Index { base, index } => {
            let value = eval_node(base, scopes, lib)?;
            let idx_value = eval_node(index, scopes, lib)?;
            match (&value, &idx_value) {
                (Value::Array(arr), Value::Number(n)) => {
                    let i = n.as_u64().ok_or("array index must be a non-negative integer")? as usize;
                    arr.get(i).cloned().ok_or_else(|| format!("index {i} out of bounds"))
                }
                (Value::Object(obj), Value::String(key)) => obj
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| format!("no property `{key}` on resolved value")),
                _ => Err("unsupported index operation".to_string()),
            }
        }
    }
}

/// True if `s` is a language expression (`[...]`), false for a literal
/// (including the `[[` escape for a literal leading bracket).
fn expression_body(s: &str) -> Option<&str> {
    if s.starts_with("[[") {
        None
    } else if s.len() >= 2 && s.starts_with('[') && s.ends_with(']') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn literal_value(s: &str) -> Value {
    if let Some(stripped) = s.strip_prefix("[[") {
        Value::String(format!("[{stripped}"))
    } else {
        Value::String(s.to_string())
    }
}

fn evaluate_string(s: &str, scopes: &Scopes, lib: &dyn ArmFunctionLibrary, mode: EvaluationMode) -> Result<Value> {
    let Some(body) = expression_body(s) else {
        return Ok(literal_value(s));
    };
    let outcome = parse(body).and_then(|node| eval_node(&node, scopes, lib));
    match outcome {
        Ok(value) => Ok(value),
        Err(message) => match mode {
            EvaluationMode::Lenient => {
                tracing::warn!(expression = s, error = %message, "language expression evaluation failed, substituting NOT_PARSED");
                Ok(Value::String(NOT_PARSED.to_string()))
            }
            EvaluationMode::Strict => Err(AnalyzerError::ExpressionEvaluation(message)),
        },
    }
}

/// Recursively evaluate every language expression reachable in `value`.
/// Non-string nodes are walked through unchanged except for their
/// descendants.
pub fn evaluate_tree(value: &Value, scopes: &Scopes, lib: &dyn ArmFunctionLibrary, mode: EvaluationMode) -> Result<Value> {
    match value {
        Value::String(s) => evaluate_string(s, scopes, lib, mode),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate_tree(item, scopes, lib, mode)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), evaluate_tree(v, scopes, lib, mode)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn scopes<'a>(parameters: &'a Map<String, Value>, variables: &'a Map<String, Value>, resources: &'a HashMap<String, Value>) -> Scopes<'a> {
        Scopes {
            parameters,
            variables,
            resources_by_name: resources,
            copy_index: Some(2),
        }
    }

    #[test]
    fn evaluates_simple_function_call() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[concat('a', 'b')]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!("ab"));
    }

    #[test]
    fn evaluates_nested_calls_and_parameters() {
        let mut params = Map::new();
        params.insert("name".to_string(), json!("storage"));
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[toUpper(parameters('name'))]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!("STORAGE"));
    }

    #[test]
    fn non_expression_strings_pass_through() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("plain string"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!("plain string"));
    }

    #[test]
    fn escaped_leading_bracket_is_literal() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[[not an expression]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!("[not an expression]"));
    }

    #[test]
    fn lenient_mode_substitutes_not_parsed_on_failure() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[parameters('missing')]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!(NOT_PARSED));
    }

    #[test]
    fn strict_mode_surfaces_the_error() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[parameters('missing')]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Strict,
        );
        assert!(matches!(result, Err(AnalyzerError::ExpressionEvaluation(_))));
    }

    #[test]
    fn copy_index_reads_from_scope() {
        let params = Map::new();
        let vars = Map::new();
        let resources = HashMap::new();
        let result = evaluate_tree(
            &json!("[copyIndex()]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn member_access_on_reference_result() {
        let params = Map::new();
        let vars = Map::new();
        let mut resources = HashMap::new();
        resources.insert("storage".to_string(), json!({"properties": {"primaryEndpoint": "https://x"}}));
        let result = evaluate_tree(
            &json!("[reference('storage').primaryEndpoint]"),
            &scopes(&params, &vars, &resources),
            &StandardArmFunctions,
            EvaluationMode::Lenient,
        )
        .unwrap();
        assert_eq!(result, json!("https://x"));
    }
}
