//! End-to-end pipeline tests: parse → expand → evaluate against small,
//! literal ARM templates and rule catalogs. Mirrors the seed test suite
//! scenarios called out for this kind of analyzer: per-rule pass/fail pairs,
//! `where`-filtered scopes, copy loop expansion, and placeholder parameter
//! generation, all driven through the public [`analyze_template`] entry
//! point rather than individual module internals.

use arm_template_analyzer::armexpr::EvaluationMode;
use arm_template_analyzer::orchestrate::analyze_template;
use arm_template_analyzer::rules::{self, RuleDefinition};
use serde_json::json;

fn https_only_rule() -> RuleDefinition {
    rules::load(
        r#"[{
            "id": "TA-000004",
            "description": "Ensure web app only accepts HTTPS traffic",
            "recommendation": "Set properties.httpsOnly to true",
            "helpUri": "https://example.invalid/TA-000004",
            "severity": 2,
            "evaluation": {
                "resourceType": "Microsoft.Web/sites",
                "path": "properties.httpsOnly",
                "equals": true
            }
        }]"#,
    )
    .unwrap()
    .remove(0)
}

fn cors_no_wildcard_rule() -> RuleDefinition {
    rules::load(
        r#"[{
            "id": "TA-000006",
            "description": "Function apps should not allow every remote origin to access the app",
            "recommendation": "Avoid `*` in cors.allowedOrigins",
            "helpUri": "https://example.invalid/TA-000006",
            "severity": 2,
            "evaluation": {
                "resourceType": "Microsoft.Web/sites",
                "where": { "path": "kind", "equals": "api" },
                "path": "properties.cors.allowedOrigins[*]",
                "notEquals": "*"
            }
        }]"#,
    )
    .unwrap()
    .remove(0)
}

fn kubernetes_version_rule() -> RuleDefinition {
    rules::load(
        r#"[{
            "id": "TA-000025",
            "description": "AKS clusters should run a supported Kubernetes version",
            "recommendation": "Upgrade kubernetesVersion past the unsupported range",
            "helpUri": "https://example.invalid/TA-000025",
            "severity": 1,
            "evaluation": {
                "resourceType": "Microsoft.ContainerService/managedClusters",
                "not": {
                    "anyOf": [
                        { "path": "properties.kubernetesVersion", "regex": "1\\.1[01]\\..*" },
                        { "path": "properties.kubernetesVersion", "regex": "1\\.9\\..*" }
                    ]
                }
            }
        }]"#,
    )
    .unwrap()
    .remove(0)
}

fn linux_functionapp_rule() -> RuleDefinition {
    rules::load(
        r#"[{
            "id": "TA-000001",
            "description": "Windows function apps should enable HTTPS-only",
            "recommendation": "Set httpsOnly to true on Windows function apps",
            "helpUri": "https://example.invalid/TA-000001",
            "severity": 2,
            "evaluation": {
                "resourceType": "Microsoft.Web/sites",
                "where": { "path": "kind", "notEquals": "functionapp,linux" },
                "path": "properties.httpsOnly",
                "equals": true
            }
        }]"#,
    )
    .unwrap()
    .remove(0)
}

#[test]
fn https_only_passes_and_fails_on_the_same_shape() {
    let failing = json!({
        "resources": [{"type": "Microsoft.Web/sites", "name": "a", "apiVersion": "2022-03-01", "properties": {"httpsOnly": false}}]
    });
    let results = analyze_template(&failing.to_string(), None, &[https_only_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].passed);
    assert_eq!(results[0].evaluation.result.as_ref().unwrap().path, "resources[0].properties.httpsOnly");

    let passing = json!({
        "resources": [{"type": "Microsoft.Web/sites", "name": "a", "apiVersion": "2022-03-01", "properties": {"httpsOnly": true}}]
    });
    let results = analyze_template(&passing.to_string(), None, &[https_only_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].passed);
}

#[test]
fn cors_wildcard_fails_at_the_wildcard_index_only() {
    let template = json!({
        "resources": [{
            "type": "Microsoft.Web/sites",
            "name": "api1",
            "apiVersion": "2022-03-01",
            "kind": "api",
            "properties": {"cors": {"allowedOrigins": ["https://a", "*"]}}
        }]
    });
    let results = analyze_template(&template.to_string(), None, &[cors_no_wildcard_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].evaluation.result.as_ref().unwrap().path, "resources[0].properties.cors.allowedOrigins[1]");

    let clean = json!({
        "resources": [{
            "type": "Microsoft.Web/sites", "name": "api1", "apiVersion": "2022-03-01", "kind": "api",
            "properties": {"cors": {"allowedOrigins": ["https://a"]}}
        }]
    });
    let results = analyze_template(&clean.to_string(), None, &[cors_no_wildcard_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert!(results.iter().all(|r| r.passed));
}

#[test]
fn kubernetes_version_regex_double_negation() {
    let unsupported = json!({
        "resources": [{
            "type": "Microsoft.ContainerService/managedClusters", "name": "aks1", "apiVersion": "2023-01-01",
            "properties": {"kubernetesVersion": "1.11.8"}
        }]
    });
    let results = analyze_template(&unsupported.to_string(), None, &[kubernetes_version_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].passed);

    let supported = json!({
        "resources": [{
            "type": "Microsoft.ContainerService/managedClusters", "name": "aks1", "apiVersion": "2023-01-01",
            "properties": {"kubernetesVersion": "1.14.0"}
        }]
    });
    let results = analyze_template(&supported.to_string(), None, &[kubernetes_version_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert!(results[0].passed);
}

#[test]
fn where_filter_rejects_linux_function_app_and_yields_no_evaluation() {
    let template = json!({
        "resources": [{
            "type": "Microsoft.Web/sites", "name": "fn1", "apiVersion": "2022-03-01",
            "kind": "functionapp,linux", "properties": {"httpsOnly": false}
        }]
    });
    let results = analyze_template(&template.to_string(), None, &[linux_functionapp_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert!(results.is_empty());
}

#[test]
fn rule_with_absent_resource_type_produces_no_evaluations() {
    let template = json!({"resources": [{"type": "Microsoft.Storage/storageAccounts", "name": "s", "apiVersion": "2022-01-01"}]});
    let results = analyze_template(&template.to_string(), None, &[https_only_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert!(results.is_empty());
}

#[test]
fn copy_loop_expands_and_reports_prototype_line_number_for_every_instance() {
    let source = r#"{
  "resources": [
    {
      "type": "Microsoft.Web/sites",
      "name": "site",
      "apiVersion": "2022-03-01",
      "copy": {"name": "loop", "count": 3},
      "properties": {"httpsOnly": false}
    }
  ]
}"#;
    let results = analyze_template(source, None, &[https_only_rule()], "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 3);
    for finding in &results {
        assert!(!finding.passed);
        let leaf = finding.evaluation.result.as_ref().unwrap();
        assert!(leaf.line > 0, "expected a resolved line number, got {leaf:?}");
    }
    // All three copy instances trace back to the same prototype line.
    let lines: Vec<u32> = results.iter().map(|r| r.evaluation.result.as_ref().unwrap().line).collect();
    assert_eq!(lines[0], lines[1]);
    assert_eq!(lines[1], lines[2]);
}

#[test]
fn missing_parameter_gets_a_deterministic_placeholder_satisfying_constraints() {
    let template = json!({
        "parameters": {"storageName": {"type": "string", "minLength": 3}},
        "resources": [{
            "type": "Microsoft.Storage/storageAccounts",
            "name": "[parameters('storageName')]",
            "apiVersion": "2022-01-01"
        }]
    });
    let name_rule = rules::load(
        r#"[{
            "id": "TA-PLACEHOLDER",
            "description": "storage account name must be at least 3 characters",
            "severity": 4,
            "evaluation": { "resourceType": "Microsoft.Storage/storageAccounts", "path": "name", "regex": ".{3,}" }
        }]"#,
    )
    .unwrap();
    let results = analyze_template(&template.to_string(), None, &name_rule, "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].passed);
}

#[test]
fn severity_filter_excludes_a_rule_by_id_before_analysis() {
    use arm_template_analyzer::config::{Exclusions, RuleFilterConfig};

    let catalog = vec![https_only_rule(), cors_no_wildcard_rule()];
    let config = RuleFilterConfig {
        exclusions: Some(Exclusions { severity: None, ids: Some(vec!["TA-000004".to_string()]) }),
        ..Default::default()
    };
    let filtered = rules::filter(&catalog, &config);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "TA-000006");
}

#[test]
fn analysis_is_deterministic_across_repeated_runs() {
    let template = json!({
        "resources": [
            {"type": "Microsoft.Web/sites", "name": "a", "apiVersion": "2022-03-01", "properties": {"httpsOnly": false}},
            {"type": "Microsoft.Web/sites", "name": "b", "apiVersion": "2022-03-01", "properties": {"httpsOnly": true}},
        ]
    });
    let catalog = vec![https_only_rule()];
    let first = analyze_template(&template.to_string(), None, &catalog, "t.json", EvaluationMode::Lenient).unwrap();
    let second = analyze_template(&template.to_string(), None, &catalog, "t.json", EvaluationMode::Lenient).unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.passed, b.passed);
        assert_eq!(a.evaluation.result.as_ref().map(|r| &r.path), b.evaluation.result.as_ref().map(|r| &r.path));
    }
}
