//! Resource flattening and `dependsOn` attachment.
//!
//! Walks the expanded template's nested `resources` arrays, assigning each
//! resource a path (`resources[i]`, `resources[i].resources[j]`, ...) and a
//! composite key (`"<name-chain> <type-chain>"`, both `/`-joined from the
//! root) that must be globally unique, case-insensitively. `dependsOn`
//! entries are then resolved against that keyed set and the dependent
//! resource is attached as a child of the resource it depends on.

use crate::error::{AnalyzerError, Result};
use crate::template::mapping::ResourceMappings;
use serde_json::Value;
use std::collections::HashMap;

/// One entry in the flattened resource set.
#[derive(Debug, Clone)]
pub struct FlattenedResource {
    pub path: String,
    pub name_chain: String,
    pub type_chain: String,
}

/// The flattened, uniquely keyed resource set. Case-insensitive lookup by
/// composite key (`"<name-chain> <type-chain>"`) and by bare name prefix.
#[derive(Debug, Clone, Default)]
pub struct FlattenedResources {
    entries: Vec<FlattenedResource>,
    /// lowercased composite key -> index into `entries`
    by_key: HashMap<String, usize>,
}

impl FlattenedResources {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FlattenedResource] {
        &self.entries
    }

    fn insert(&mut self, entry: FlattenedResource) -> Result<()> {
        let key = format!("{} {}", entry.name_chain, entry.type_chain).to_ascii_lowercase();
        if let Some(&existing) = self.by_key.get(&key) {
            return Err(AnalyzerError::TemplateParse(format!(
                "duplicate resource key `{key}` at `{}` (first seen at `{}`)",
                entry.path, self.entries[existing].path
            )));
        }
        self.by_key.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Resolve a `/subscriptions/.../providers/...` resource id, or a bare
    /// resource name, to the flattened entry it identifies. Ambiguous bare
    /// names resolve to `None` (caller logs a warning and skips attachment).
    fn resolve_dependency(&self, reference: &str) -> Option<&FlattenedResource> {
        if reference.starts_with('/') {
            let (name_chain, type_chain) = parse_resource_id(reference)?;
            let key = format!("{name_chain} {type_chain}").to_ascii_lowercase();
            self.by_key.get(&key).map(|&i| &self.entries[i])
        } else {
            let prefix = format!("{} ", reference.to_ascii_lowercase());
            let mut matches = self
                .entries
                .iter()
                .filter(|e| format!("{} ", e.name_chain).to_ascii_lowercase().starts_with(&prefix));
            let first = matches.next()?;
            if matches.next().is_some() {
                None
            } else {
                Some(first)
            }
        }
    }
}

/// Parse `/subscriptions/{sub}/resourceGroups/{rg}/providers/{provider}/{type}/{name}[/{type}/{name}...]`
/// into `(name_chain, type_chain)`, both `/`-joined.
fn parse_resource_id(id: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = id.split('/').filter(|s| !s.is_empty()).collect();
    let providers_idx = segments.iter().position(|s| s.eq_ignore_ascii_case("providers"))?;
    let provider = segments.get(providers_idx + 1)?;
    let rest = &segments[providers_idx + 2..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return None;
    }
    let mut types = vec![(*provider).to_string()];
    let mut names = Vec::new();
    for pair in rest.chunks(2) {
        types.push(pair[0].to_string());
        names.push(pair[1].to_string());
    }
    Some((names.join("/"), types.join("/")))
}

fn resources_array(node: &Value) -> Option<&Vec<Value>> {
    node.get("resources").and_then(Value::as_array)
}

fn resource_name(node: &Value) -> String {
    node.get("name").and_then(Value::as_str).unwrap_or("").to_string()
}

fn resource_type(node: &Value) -> String {
    node.get("type").and_then(Value::as_str).unwrap_or("").to_string()
}

fn walk(
    node: &Value,
    path_prefix: &str,
    name_chain_prefix: &str,
    type_chain_prefix: &str,
    flattened: &mut FlattenedResources,
) -> Result<()> {
    let Some(resources) = resources_array(node) else {
        return Ok(());
    };
    for (i, resource) in resources.iter().enumerate() {
        let path = format!("{path_prefix}resources[{i}]");
        let name_chain = chain(name_chain_prefix, &resource_name(resource));
        let type_chain = chain(type_chain_prefix, &resource_type(resource));
        flattened.insert(FlattenedResource {
            path: path.clone(),
            name_chain: name_chain.clone(),
            type_chain: type_chain.clone(),
        })?;
        walk(resource, &format!("{path}."), &name_chain, &type_chain, flattened)?;
    }
    Ok(())
}

fn chain(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}

/// Flatten `template`'s nested resources, assigning paths and composite
/// keys. Fails if two resources share a case-insensitive composite key.
pub fn flatten(template: &Value) -> Result<FlattenedResources> {
    let mut flattened = FlattenedResources::default();
    walk(template, "", "", "", &mut flattened)?;
    Ok(flattened)
}

/// Attach each flattened resource's `dependsOn` targets as children of the
/// resource they depend on, recording the resulting path mappings. Mutates
/// `template` in place by appending into each parent's `resources` array.
pub fn attach_depends_on(template: &mut Value, flattened: &FlattenedResources, mappings: &mut ResourceMappings) -> Result<()> {
    let dependents: Vec<(String, Vec<String>)> = flattened
        .entries()
        .iter()
        .filter_map(|entry| {
            let resource = lookup_path(template, &entry.path)?;
            let depends_on = resource.get("dependsOn")?.as_array()?;
            let refs: Vec<String> = depends_on.iter().filter_map(Value::as_str).map(str::to_string).collect();
            if refs.is_empty() {
                None
            } else {
                Some((entry.path.clone(), refs))
            }
        })
        .collect();

    for (child_path, refs) in dependents {
        for reference in refs {
            let Some(parent) = flattened.resolve_dependency(&reference) else {
                tracing::warn!(reference = %reference, child = %child_path, "dependsOn target not found or ambiguous, skipping attachment");
                continue;
            };
            let Some(child_value) = lookup_path(template, &child_path).cloned() else {
                continue;
            };
            let parent_path = parent.path.clone();
            let Some(parent_node) = lookup_path_mut(template, &parent_path) else {
                continue;
            };
            let obj = parent_node
                .as_object_mut()
                .expect("resource nodes are JSON objects");
            let child_resources = obj
                .entry("resources")
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .expect("resources is always an array once inserted");
            let k = child_resources.len();
            child_resources.push(child_value);
            mappings.add(format!("{parent_path}.resources[{k}]"), child_path.clone())?;
        }
    }
    Ok(())
}

fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if let Some(rest) = segment.strip_suffix(']') {
            let (key, idx) = rest.split_once('[')?;
            if !key.is_empty() {
                current = current.get(key)?;
            }
            current = current.get(idx.parse::<usize>().ok()?)?;
        } else {
            current = current.get(segment)?;
        }
    }
    Some(current)
}

fn lookup_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.split('.') {
        if let Some(rest) = segment.strip_suffix(']') {
            let (key, idx) = rest.split_once('[')?;
            if !key.is_empty() {
                current = current.get_mut(key)?;
            }
            current = current.get_mut(idx.parse::<usize>().ok()?)?;
        } else {
            current = current.get_mut(segment)?;
        }
    }
    Some(current)
}
