//! Expression Tree
//!
//! The parsed AST of a rule's `evaluation` field: `Leaf`, `AllOf`, `AnyOf`,
//! `Not`, `Scoped`.
//!
//! A scoped node carries `resourceType`/`where` alongside the same keys that
//! identify its body, so `Expression` parses itself out of a
//! [`serde_json::Value`] by hand rather than via `#[derive(Deserialize)]`.

use crate::ops::{self, Operator};
use crate::path::{self, Resolved};
use serde::Serialize;
use serde_json::{Map, Value};

/// The path and concrete value a failing (or, for diagnostics, passing) leaf
/// was evaluated at. `line`/`column` start at the "unknown" sentinel `0` and
/// are filled in later by the rule runner, which owns the line number
/// resolver and the expanded-to-original path mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafResult {
    /// The absolute path the leaf was evaluated against, in the expanded
    /// (post copy-loop) template.
    pub path: String,
    #[serde(default, rename = "line_number", skip_serializing_if = "is_zero")]
    pub line: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub column: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl LeafResult {
    /// `"line:column"`, or `"unknown"` when the line number resolver never
    /// ran or missed.
    pub fn line_number_display(&self) -> String {
        if self.line == 0 {
            "unknown".to_string()
        } else {
            format!("{}:{}", self.line, self.column)
        }
    }
}

/// The outcome of evaluating one expression node against one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Whether this node passed for this scope.
    pub passed: bool,
    /// Present on (typically failing) leaf evaluations; carries the
    /// offending path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LeafResult>,
    /// Child outcomes, retained for diagnostics even when `passed` is true.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_evaluations: Vec<Evaluation>,
}

impl Evaluation {
    fn leaf(passed: bool, path: String) -> Self {
        Evaluation {
            passed,
            result: if passed { None } else { Some(LeafResult { path, line: 0, column: 0 }) },
            sub_evaluations: Vec::new(),
        }
    }

    /// Visit every [`LeafResult`] reachable from this evaluation, in `self`
    /// and recursively through `sub_evaluations`.
    pub fn for_each_result_mut(&mut self, f: &mut impl FnMut(&mut LeafResult)) {
        if let Some(result) = &mut self.result {
            f(result);
        }
        for sub in &mut self.sub_evaluations {
            sub.for_each_result_mut(f);
        }
    }
}

/// The rule DSL's closed expression sum type. Dispatch is by explicit match,
/// never by subtype polymorphism.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `{ allOf: [expr, ...] }`
    AllOf(Vec<Expression>),
    /// `{ anyOf: [expr, ...] }`
    AnyOf(Vec<Expression>),
    /// `{ not: expr }`
    Not(Box<Expression>),
    /// `{ resourceType?, where?, ...body-shape }`
    Scoped {
        resource_type: Option<String>,
        where_: Option<Box<Expression>>,
        body: Box<Expression>,
    },
    /// `{ path, <op>: operand }`
    Leaf {
        path: String,
        operator: Operator,
        operand: Value,
    },
}

const OP_NAMES: &[(&str, Operator)] = &[
    ("equals", Operator::Equals),
    ("notEquals", Operator::NotEquals),
    ("hasValue", Operator::HasValue),
    ("exists", Operator::Exists),
    ("in", Operator::In),
    ("regex", Operator::Regex),
    ("greater", Operator::Greater),
    ("greaterOrEquals", Operator::GreaterOrEquals),
    ("less", Operator::Less),
    ("lessOrEquals", Operator::LessOrEquals),
);

fn operator_key(operator: Operator) -> &'static str {
    OP_NAMES
        .iter()
        .find(|(_, op)| *op == operator)
        .map(|(name, _)| *name)
        .expect("OP_NAMES covers every Operator variant")
}

impl Expression {
    /// Parse one expression node from its JSON object form.
    pub fn from_json(value: &Value) -> Result<Expression, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "expression must be a JSON object".to_string())?;

        let resource_type = obj
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string);
        let where_ = match obj.get("where") {
            Some(w) => Some(Box::new(Expression::from_json(w)?)),
            None => None,
        };

        let body = if let Some(children) = obj.get("allOf") {
            Expression::AllOf(parse_children(children)?)
        } else if let Some(children) = obj.get("anyOf") {
            Expression::AnyOf(parse_children(children)?)
        } else if let Some(child) = obj.get("not") {
            Expression::Not(Box::new(Expression::from_json(child)?))
        } else if let Some(path) = obj.get("path").and_then(Value::as_str) {
            let (op_name, operator) = OP_NAMES
                .iter()
                .find(|(name, _)| obj.contains_key(*name))
                .ok_or_else(|| format!("leaf at `{path}` is missing a recognized operator key"))?;
            let operand = obj
                .get(*op_name)
                .cloned()
                .expect("contains_key guarantees get succeeds");
            Expression::Leaf {
                path: path.to_string(),
                operator: *operator,
                operand,
            }
        } else if resource_type.is_some() || where_.is_some() {
            return Err("scoped expression has resourceType/where but no body".to_string());
        } else {
            return Err("unrecognized expression shape".to_string());
        };

        if resource_type.is_some() || where_.is_some() {
            Ok(Expression::Scoped {
                resource_type,
                where_,
                body: Box::new(body),
            })
        } else {
            Ok(body)
        }
    }

    /// Serialize back to the DSL's JSON object shape.
    pub fn to_json(&self) -> Value {
        match self {
            Expression::AllOf(children) => {
                Value::Object(Map::from_iter([(
                    "allOf".to_string(),
                    Value::Array(children.iter().map(Expression::to_json).collect()),
                )]))
            }
            Expression::AnyOf(children) => {
                Value::Object(Map::from_iter([(
                    "anyOf".to_string(),
                    Value::Array(children.iter().map(Expression::to_json).collect()),
                )]))
            }
            Expression::Not(child) => {
                Value::Object(Map::from_iter([("not".to_string(), child.to_json())]))
            }
            Expression::Leaf { path, operator, operand } => {
                let mut map = Map::new();
                map.insert("path".to_string(), Value::String(path.clone()));
                map.insert(operator_key(*operator).to_string(), operand.clone());
                Value::Object(map)
            }
            Expression::Scoped { resource_type, where_, body } => {
                let mut map = match body.to_json() {
                    Value::Object(m) => m,
                    other => {
                        let mut m = Map::new();
                        m.insert("body".to_string(), other);
                        m
                    }
                };
                if let Some(rt) = resource_type {
                    map.insert("resourceType".to_string(), Value::String(rt.clone()));
                }
                if let Some(w) = where_ {
                    map.insert("where".to_string(), w.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

fn parse_children(value: &Value) -> Result<Vec<Expression>, String> {
    value
        .as_array()
        .ok_or_else(|| "combinator operand must be an array".to_string())?
        .iter()
        .map(Expression::from_json)
        .collect()
}

/// Enumerate every resource in `root`, depth-first, mirroring the template
/// processor's flattening order. Returns `(absolute_path, resource_value)`
/// pairs.
fn enumerate_resources(root: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    fn walk(node: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
        let Some(resources) = node.get("resources").and_then(Value::as_array) else {
            return;
        };
        for (i, res) in resources.iter().enumerate() {
            let path = format!("{prefix}resources[{i}]");
            out.push((path.clone(), res.clone()));
            walk(res, &format!("{path}."), out);
        }
    }
    walk(root, "", &mut out);
    out
}

fn resource_type_matches(resource: &Value, wanted: &str) -> bool {
    resource
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case(wanted))
}

/// Evaluate `expr` against `scope`, with `root` retained for `Scoped`
/// resource enumeration and `scope_path` the absolute path prefix leaf
/// paths are resolved relative to.
pub fn evaluate(expr: &Expression, root: &Value, scope: &Value, scope_path: &str) -> Vec<Evaluation> {
    match expr {
        Expression::Leaf { path, operator, operand } => evaluate_leaf(path, *operator, operand, scope, scope_path),
        Expression::AllOf(children) => vec![evaluate_all_of(children, root, scope, scope_path)],
        Expression::AnyOf(children) => vec![evaluate_any_of(children, root, scope, scope_path)],
        Expression::Not(child) => vec![evaluate_not(child, root, scope, scope_path)],
        Expression::Scoped { resource_type, where_, body } => {
            evaluate_scoped(resource_type.as_deref(), where_.as_deref(), body, root, scope, scope_path)
        }
    }
}

fn evaluate_leaf(path: &str, operator: Operator, operand: &Value, scope: &Value, scope_path: &str) -> Vec<Evaluation> {
    let matches = path::resolve(scope, path);
    if matches.is_empty() {
        // No sub-document reachable at all (missing intermediate key, or a
        // wildcard over an empty array): universal quantification over the
        // empty set is vacuously true.
        return vec![Evaluation::leaf(true, absolute(scope_path, path))];
    }
    matches
        .into_iter()
        .map(|m| {
            let abs_path = absolute(scope_path, &m.path);
            let passed = ops::evaluate(operator, &m.value, operand);
            Evaluation::leaf(passed, abs_path)
        })
        .collect()
}

fn absolute(scope_path: &str, relative: &str) -> String {
    if scope_path.is_empty() {
        relative.to_string()
    } else if relative.is_empty() {
        scope_path.to_string()
    } else {
        format!("{scope_path}.{relative}")
    }
}

fn evaluate_all_of(children: &[Expression], root: &Value, scope: &Value, scope_path: &str) -> Evaluation {
    let mut sub = Vec::new();
    let mut passed = true;
    for child in children {
        let outcomes = evaluate(child, root, scope, scope_path);
        passed &= outcomes.iter().all(|o| o.passed);
        sub.extend(outcomes);
    }
    Evaluation {
        passed,
        result: None,
        sub_evaluations: sub,
    }
}

fn evaluate_any_of(children: &[Expression], root: &Value, scope: &Value, scope_path: &str) -> Evaluation {
    let mut sub = Vec::new();
    let mut passed = false;
    for child in children {
        let outcomes = evaluate(child, root, scope, scope_path);
        if outcomes.iter().all(|o| o.passed) {
            passed = true;
        }
        sub.extend(outcomes);
    }
    Evaluation {
        passed,
        result: None,
        sub_evaluations: sub,
    }
}

fn evaluate_not(child: &Expression, root: &Value, scope: &Value, scope_path: &str) -> Evaluation {
    let outcomes = evaluate(child, root, scope, scope_path);
    let child_passed = outcomes.iter().all(|o| o.passed);
    Evaluation {
        passed: !child_passed,
        result: None,
        sub_evaluations: outcomes,
    }
}

fn evaluate_scoped(
    resource_type: Option<&str>,
    where_: Option<&Expression>,
    body: &Expression,
    root: &Value,
    scope: &Value,
    scope_path: &str,
) -> Vec<Evaluation> {
    let Some(resource_type) = resource_type else {
        // Stay in the current scope: apply `where` as a silent gate, then
        // evaluate `body` directly against the unchanged scope.
        if let Some(where_expr) = where_ {
            let gate = evaluate(where_expr, root, scope, scope_path);
            if !gate.iter().all(|o| o.passed) {
                return Vec::new();
            }
        }
        return evaluate(body, root, scope, scope_path);
    };

    let mut evaluations = Vec::new();
    for (path, resource) in enumerate_resources(root) {
        if !resource_type_matches(&resource, resource_type) {
            continue;
        }
        if let Some(where_expr) = where_ {
            let gate = evaluate(where_expr, root, &resource, &path);
            if !gate.iter().all(|o| o.passed) {
                continue;
            }
        }
        evaluations.extend(evaluate(body, root, &resource, &path));
    }
    evaluations
}
