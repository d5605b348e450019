//! Orchestration
//!
//! End-to-end pipeline glue: parse raw template text, run the Template
//! Processor, build a [`TemplateContext`], run the Rule Runner, and resolve
//! every finding's line number against the original source text. Bicep
//! compilation and report formatting are external collaborators - only the
//! [`BicepCompiler`] seam is defined here, same as [`crate::lineno::BicepSourceMap`].

use crate::armexpr::EvaluationMode;
use crate::error::{AnalyzerError, Result};
use crate::lineno::{BicepSourceMap, LineNumberResolver};
use crate::rules::RuleDefinition;
use crate::runner::{self, TaggedEvaluation};
use crate::template::{self, mapping::ResourceMappings};
use serde_json::Value;

/// Bundles the expanded template with everything the rule runner and line
/// number resolver need to report findings against original source
/// coordinates.
pub struct TemplateContext {
    pub expanded_template: Value,
    pub mappings: ResourceMappings,
    pub template_identifier: String,
    source: String,
}

/// Compiles Bicep source to an ARM JSON template plus a source map. No
/// implementation ships here; Bicep compilation is an explicitly external
/// collaborator, hosts that need it provide their own adapter.
pub trait BicepCompiler {
    fn compile(&self, bicep_source: &str) -> std::result::Result<(String, Box<dyn BicepSourceMap>), String>;
}

/// Parse and process one template, producing its [`TemplateContext`].
/// `raw_template` must already be ARM JSON - Bicep inputs are compiled by
/// the caller via a [`BicepCompiler`] before reaching this function.
pub fn build_context(
    raw_template: &str,
    parameters_doc: Option<&Value>,
    template_identifier: &str,
    mode: EvaluationMode,
) -> Result<TemplateContext> {
    let template: Value = serde_json::from_str(raw_template)
        .map_err(|e| AnalyzerError::TemplateParse(format!("invalid JSON: {e}")))?;
    let expanded = template::process(&template, parameters_doc, mode)?;
    Ok(TemplateContext {
        expanded_template: expanded.template,
        mappings: expanded.mappings,
        template_identifier: template_identifier.to_string(),
        source: raw_template.to_string(),
    })
}

/// Run the full pipeline against one template: process, evaluate every rule
/// in `catalog`, and resolve each finding's line number. Rules should
/// already have passed through [`crate::rules::filter`] - this function
/// runs whatever catalog it is given, unfiltered.
pub fn analyze_template(
    raw_template: &str,
    parameters_doc: Option<&Value>,
    catalog: &[RuleDefinition],
    template_identifier: &str,
    mode: EvaluationMode,
) -> Result<Vec<TaggedEvaluation>> {
    let context = build_context(raw_template, parameters_doc, template_identifier, mode)?;
    let mut results = runner::analyze(catalog, &context.expanded_template, &context.template_identifier);
    let resolver = LineNumberResolver::from_source(&context.source);
    runner::attach_line_numbers(&mut results, &context.mappings, &resolver);
    Ok(results)
}
