//! JSON Path Resolver
//!
//! Resolves a dot-and-bracket path (`resources[3].properties.cors.allowedOrigins[0]`)
//! against a [`serde_json::Value`] tree, producing every matching sub-document
//! together with the *concrete* absolute path it was found at. `[*]` expands
//! to every array element; object key lookup is case-insensitive.

use serde_json::Value;
use std::fmt;

/// A resolved sub-document: either a real JSON value, or the sentinel for a
/// path segment whose terminal key was absent from its parent object/array.
/// `Missing` is distinct from [`serde_json::Value::Null`] - a key present
/// with an explicit `null` value resolves to `Value(Value::Null)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The concrete JSON value found at the path.
    Value(Value),
    /// The terminal segment of the path was absent from its parent.
    Missing,
}

impl Resolved {
    /// True if this is the `Missing` sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Resolved::Missing)
    }

    /// Borrow the underlying value, or `None` if this is `Missing`.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Missing => None,
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(v) => write!(f, "{v}"),
            Resolved::Missing => write!(f, "<missing>"),
        }
    }
}

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A resolved result: the sub-document and the concrete absolute path it was
/// found at (wildcards replaced with the specific index that matched).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The resolved sub-document.
    pub value: Resolved,
    /// The concrete absolute path, e.g. `resources[2].properties.httpsOnly`.
    pub path: String,
}

/// Parse a path string into its segments.
///
/// Grammar: `identifier ('.' identifier | '[' (digits | '*') ']')*`
fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let chars: Vec<char> = path.chars().collect();
    let mut i = 0;
    let mut current = String::new();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| {
        if !current.is_empty() {
            segments.push(Segment::Key(std::mem::take(current)));
        }
    };

    while i < chars.len() {
        match chars[i] {
            '.' => {
                flush(&mut current, &mut segments);
                i += 1;
            }
            '[' => {
                flush(&mut current, &mut segments);
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != ']' {
                    end += 1;
                }
                let inner: String = chars[start..end].iter().collect();
                if inner == "*" {
                    segments.push(Segment::Wildcard);
                } else if let Ok(idx) = inner.parse::<usize>() {
                    segments.push(Segment::Index(idx));
                } else {
                    // Not a recognized bracket form; treat literally as a key
                    // so a malformed path fails to resolve rather than panics.
                    segments.push(Segment::Key(format!("[{inner}]")));
                }
                i = end + 1;
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    flush(&mut current, &mut segments);
    segments
}

fn key_eq(key: &str, target: &str) -> bool {
    key.eq_ignore_ascii_case(target)
}

fn object_get_ci<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_object()?
        .iter()
        .find(|(k, _)| key_eq(k, key))
        .map(|(_, v)| v)
}

fn resolve_segments(current: &Value, path_so_far: &str, segments: &[Segment]) -> Vec<Match> {
    let Some((head, rest)) = segments.split_first() else {
        return vec![Match {
            value: Resolved::Value(current.clone()),
            path: path_so_far.to_string(),
        }];
    };

    match head {
        Segment::Key(key) => {
            let appended = if path_so_far.is_empty() {
                key.clone()
            } else {
                format!("{path_so_far}.{key}")
            };
            match object_get_ci(current, key) {
                Some(next) => resolve_segments(next, &appended, rest),
                None => missing_or_empty(rest, &appended),
            }
        }
        Segment::Index(idx) => {
            let appended = format!("{path_so_far}[{idx}]");
            match current.as_array().and_then(|a| a.get(*idx)) {
                Some(next) => resolve_segments(next, &appended, rest),
                None => missing_or_empty(rest, &appended),
            }
        }
        Segment::Wildcard => match current.as_array() {
            Some(arr) => arr
                .iter()
                .enumerate()
                .flat_map(|(idx, next)| {
                    let appended = format!("{path_so_far}[{idx}]");
                    resolve_segments(next, &appended, rest)
                })
                .collect(),
            // A wildcard over a non-array has no elements to fan out over;
            // this is a structural non-match, not a missing terminal key.
            None => Vec::new(),
        },
    }
}

/// A terminal key/index absent from its parent yields exactly one `Missing`
/// result; an absent *intermediate* segment yields no results at all.
fn missing_or_empty(remaining: &[Segment], path_so_far: &str) -> Vec<Match> {
    if remaining.is_empty() {
        vec![Match {
            value: Resolved::Missing,
            path: path_so_far.to_string(),
        }]
    } else {
        Vec::new()
    }
}

/// Resolve `path` against `doc`, yielding zero or more matches.
pub fn resolve(doc: &Value, path: &str) -> Vec<Match> {
    let segments = parse(path);
    if segments.is_empty() {
        return vec![Match {
            value: Resolved::Value(doc.clone()),
            path: String::new(),
        }];
    }
    resolve_segments(doc, "", &segments)
}
