//! Rule Runner
//!
//! Drives every rule in a (filtered) catalog against an expanded template,
//! tagging each emitted [`Evaluation`] with its originating rule and the
//! template's file identifier. Mirrors the teacher's `RuleExecutor` driving
//! loop (`executor.rs`: compile once, iterate matches, collect
//! `ExecutionResult`s) generalized from AST node matches to JSON Path
//! resolver matches.

use crate::expr::{self, Evaluation};
use crate::lineno::LineNumberResolver;
use crate::rules::RuleDefinition;
use crate::template::mapping::ResourceMappings;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

/// One rule's outcome against one resource, with rule metadata attached.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedEvaluation {
    pub rule_id: String,
    pub description: String,
    pub severity: u8,
    pub passed: bool,
    pub file_identifier: String,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Run every rule in `catalog` against `template`, in `(rule_index,
/// resource_discovery_order)` order.
#[instrument(skip(catalog, template), fields(rule_count = catalog.len()))]
pub fn analyze(catalog: &[RuleDefinition], template: &Value, file_identifier: &str) -> Vec<TaggedEvaluation> {
    let mut out = Vec::new();
    for rule in catalog {
        let outcomes = expr::evaluate(&rule.evaluation, template, template, "");
        tracing::debug!(rule_id = %rule.id, outcome_count = outcomes.len(), "rule evaluated");
        for evaluation in outcomes {
            out.push(TaggedEvaluation {
                rule_id: rule.id.clone(),
                description: rule.description.clone(),
                severity: rule.severity,
                passed: evaluation.passed,
                file_identifier: file_identifier.to_string(),
                evaluation,
            });
        }
    }
    out
}

/// Fill in `line`/`column` on every [`crate::expr::LeafResult`] in `results`,
/// translating each leaf's expanded-template path back to the original
/// source path via `mappings` before looking it up in `resolver`. Paths with
/// no recorded mapping are looked up as-is (they were never touched by copy
/// expansion or `dependsOn` attachment, so the expanded path already is the
/// original one).
pub fn attach_line_numbers(results: &mut [TaggedEvaluation], mappings: &ResourceMappings, resolver: &LineNumberResolver) {
    for tagged in results {
        tagged.evaluation.for_each_result_mut(&mut |leaf| {
            let original_path = mappings.resolve(&leaf.path).unwrap_or_else(|| leaf.path.clone());
            let (line, column) = resolver.resolve(&original_path);
            leaf.line = line;
            leaf.column = column;
        });
    }
}
