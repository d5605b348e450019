//! Template Processor
//!
//! Simulates ARM deployment-time expansion: placeholder parameters, copy
//! loop expansion, language expression evaluation, resource flattening, and
//! `dependsOn` attachment, producing an [`ExpandedTemplate`] plus the
//! [`ResourceMappings`] the rule runner and line number resolver need to
//! report original source locations.

pub mod flatten;
pub mod mapping;
pub mod placeholder;

use crate::armexpr::{self, EvaluationMode, Scopes, StandardArmFunctions};
use crate::error::{AnalyzerError, Result};
use flatten::FlattenedResources;
use mapping::ResourceMappings;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The fully expanded template plus the bookkeeping rules need to report
/// provenance.
pub struct ExpandedTemplate {
    pub template: Value,
    pub mappings: ResourceMappings,
    pub flattened: FlattenedResources,
}

fn validate_top_level(template: &Value) -> Result<()> {
    if !template.is_object() {
        return Err(AnalyzerError::TemplateParse("template must be a JSON object".to_string()));
    }
    if template.get("resources").is_none() {
        return Err(AnalyzerError::TemplateParse("template is missing the `resources` key".to_string()));
    }
    Ok(())
}

fn bind_parameters(template: &Value, supplied: Option<&Value>) -> Result<Map<String, Value>> {
    let declared = template.get("parameters").and_then(Value::as_object).cloned().unwrap_or_default();
    let mut bound = placeholder::generate_all(&declared);

    let Some(supplied) = supplied else {
        return Ok(bound);
    };
    let entries = supplied
        .get("parameters")
        .and_then(Value::as_object)
        .ok_or_else(|| AnalyzerError::ParameterParse("parameters document is missing the `parameters` key".to_string()))?;

    for (name, entry) in entries {
        if let Some(value) = entry.get("value") {
            bound.insert(name.clone(), value.clone());
        } else if entry.get("reference").is_some() {
            bound.insert(name.clone(), Value::String(format!("REF_NOT_AVAIL_{name}")));
        }
    }
    Ok(bound)
}

/// Evaluate the `variables` section to a fixed point: variables may
/// reference other variables or parameters, so evaluation is repeated until
/// stable or a small iteration bound is reached.
fn evaluate_variables(template: &Value, parameters: &Map<String, Value>, resources_by_name: &HashMap<String, Value>) -> Map<String, Value> {
    let declared = template.get("variables").and_then(Value::as_object).cloned().unwrap_or_default();
    let mut current = declared;
    for _ in 0..5 {
        let scopes = Scopes {
            parameters,
            variables: &current,
            resources_by_name,
            copy_index: None,
        };
        let evaluated = armexpr::evaluate_tree(&Value::Object(current.clone()), &scopes, &StandardArmFunctions, EvaluationMode::Lenient)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_else(|| current.clone());
        if evaluated == current {
            break;
        }
        current = evaluated;
    }
    current
}

/// Build a `reference()` lookup table from the raw, pre-expansion resource
/// tree: every resource with a literal string `name` is indexed by that
/// literal, recursively through nested `resources`. Resources named by an
/// expression aren't reachable until that expression is evaluated.
fn collect_resources_by_name(resources: &[Value]) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    fn walk(resources: &[Value], out: &mut HashMap<String, Value>) {
        for resource in resources {
            if let Some(name) = resource.get("name").and_then(Value::as_str) {
                out.insert(name.to_string(), resource.clone());
            }
            if let Some(nested) = resource.get("resources").and_then(Value::as_array) {
                walk(nested, out);
            }
        }
    }
    walk(resources, &mut out);
    out
}

fn copy_loop(resource: &Value) -> Option<i64> {
    resource.get("copy").and_then(|c| c.get("count")).and_then(Value::as_i64)
}

fn strip_copy(mut resource: Value) -> Value {
    if let Some(obj) = resource.as_object_mut() {
        obj.remove("copy");
    }
    resource
}

/// Expand one `resources` array (possibly nested), handling copy loops and
/// evaluating every instance's language expressions. Returns the expanded
/// array; mappings for each instance are recorded against `path_prefix`.
fn expand_resources(
    resources: &[Value],
    path_prefix: &str,
    parameters: &Map<String, Value>,
    variables: &Map<String, Value>,
    resources_by_name: &HashMap<String, Value>,
    mode: EvaluationMode,
    mappings: &mut ResourceMappings,
) -> Result<Vec<Value>> {
    let mut out = Vec::new();

    for (orig_idx, resource) in resources.iter().enumerate() {
        let count = copy_loop(resource);
        let instance_count = count.unwrap_or(1).max(0) as usize;
        let original_path = format!("{path_prefix}resources[{orig_idx}]");

        for offset in 0..instance_count {
            let new_idx = out.len();
            let new_path = format!("{path_prefix}resources[{new_idx}]");
            mappings.add(new_path.clone(), original_path.clone())?;

            let scopes = Scopes {
                parameters,
                variables,
                resources_by_name,
                copy_index: count.map(|_| offset as i64),
            };
            let stripped = strip_copy(resource.clone());
            let mut evaluated = armexpr::evaluate_tree(&stripped, &scopes, &StandardArmFunctions, mode)?;

            if let Some(nested) = evaluated.get("resources").and_then(Value::as_array).cloned() {
                let nested_expanded =
                    expand_resources(&nested, &format!("{new_path}."), parameters, variables, resources_by_name, mode, mappings)?;
                evaluated["resources"] = Value::Array(nested_expanded);
            }
            out.push(evaluated);
        }
    }
    Ok(out)
}

/// Run the full template processing pipeline.
pub fn process(template: &Value, parameters_doc: Option<&Value>, mode: EvaluationMode) -> Result<ExpandedTemplate> {
    validate_top_level(template)?;

    let parameters = bind_parameters(template, parameters_doc)?;
    let top_level = template.get("resources").and_then(Value::as_array).cloned().unwrap_or_default();
    let resources_by_name = collect_resources_by_name(&top_level);
    let variables = evaluate_variables(template, &parameters, &resources_by_name);

    let mut mappings = ResourceMappings::new();
    let expanded_resources = expand_resources(&top_level, "", &parameters, &variables, &resources_by_name, mode, &mut mappings)?;

    let mut expanded_template = template.clone();
    expanded_template["resources"] = Value::Array(expanded_resources);
    if let Some(outputs) = template.get("outputs") {
        let scopes = Scopes { parameters: &parameters, variables: &variables, resources_by_name: &resources_by_name, copy_index: None };
        expanded_template["outputs"] = armexpr::evaluate_tree(outputs, &scopes, &StandardArmFunctions, mode)?;
    }

    let flattened = flatten::flatten(&expanded_template)?;
    flatten::attach_depends_on(&mut expanded_template, &flattened, &mut mappings)?;

    Ok(ExpandedTemplate {
        template: expanded_template,
        mappings,
        flattened,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_resources_key_is_rejected() {
        let template = json!({"parameters": {}});
        assert!(process(&template, None, EvaluationMode::Lenient).is_err());
    }

    #[test]
    fn generates_placeholder_for_missing_parameter() {
        let template = json!({
            "parameters": {"storageName": {"type": "string", "minLength": 3}},
            "resources": [{"name": "[parameters('storageName')]", "type": "Microsoft.Storage/storageAccounts"}]
        });
        let expanded = process(&template, None, EvaluationMode::Lenient).unwrap();
        let name = expanded.template["resources"][0]["name"].as_str().unwrap().to_string();
        assert!(name.len() >= 3);
    }

    #[test]
    fn copy_loop_expands_to_n_resources_with_prototype_mapping() {
        let template = json!({
            "resources": [
                {"name": "storage", "type": "Microsoft.Storage/storageAccounts", "copy": {"name": "loop", "count": 3}}
            ]
        });
        let expanded = process(&template, None, EvaluationMode::Lenient).unwrap();
        let resources = expanded.template["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 3);
        for i in 0..3 {
            assert_eq!(expanded.mappings.resolve(&format!("resources[{i}]")).as_deref(), Some("resources[0]"));
        }
    }

    #[test]
    fn reference_parameter_uses_sentinel() {
        let template = json!({
            "parameters": {"adminPassword": {"type": "securestring"}},
            "resources": []
        });
        let params_doc = json!({"parameters": {"adminPassword": {"reference": {"keyVault": {"id": "x"}, "secretName": "y"}}}});
        let expanded = process(&template, Some(&params_doc), EvaluationMode::Lenient).unwrap();
        assert!(expanded.template.is_object());
    }

    #[test]
    fn reference_resolves_a_sibling_resource_by_literal_name() {
        let template = json!({
            "resources": [
                {"name": "storage1", "type": "Microsoft.Storage/storageAccounts", "properties": {"primaryEndpoint": "https://storage1.blob.core.windows.net/"}},
                {"name": "site1", "type": "Microsoft.Web/sites", "properties": {"endpoint": "[reference('storage1').primaryEndpoint]"}},
            ]
        });
        let expanded = process(&template, None, EvaluationMode::Lenient).unwrap();
        let endpoint = expanded.template["resources"][1]["properties"]["endpoint"].as_str().unwrap().to_string();
        assert_eq!(endpoint, "https://storage1.blob.core.windows.net/");
    }

    #[test]
    fn depends_on_attaches_child_and_maps_path() {
        let template = json!({
            "resources": [
                {"name": "storage1", "type": "Microsoft.Storage/storageAccounts"},
                {"name": "site1", "type": "Microsoft.Web/sites", "dependsOn": ["storage1"]},
            ]
        });
        let expanded = process(&template, None, EvaluationMode::Lenient).unwrap();
        let parent = &expanded.template["resources"][0];
        assert_eq!(parent["resources"][0]["name"], json!("site1"));
    }
}
