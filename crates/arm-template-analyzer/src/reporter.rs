//! Finding Report Generation
//!
//! Generates reports in multiple formats from a rule run's findings:
//! - JSON for CI integration
//! - Human-readable for terminal output
//! - CI summary (GitHub Actions annotations) for pull request checks
//!
//! Report formatting is an external collaborator per scope - this module is
//! host glue callers may use directly, or replace entirely with their own
//! formatter over [`TaggedEvaluation`].

use crate::runner::TaggedEvaluation;
use serde::{Deserialize, Serialize};

/// One template's complete set of rule findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub template_identifier: String,
    pub summary: AnalysisSummary,
    pub findings: Vec<TaggedEvaluation>,
}

/// Aggregate counters over a report's findings, broken down by severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_evaluated: usize,
    pub failed: usize,
    pub severity_1_count: usize,
    pub severity_2_count: usize,
    pub severity_3_count: usize,
    pub severity_4_count: usize,
    pub passed: bool,
}

impl AnalysisReport {
    /// Build a report from one template's raw findings. Only failing
    /// evaluations count toward `failed`/severity buckets; passing
    /// evaluations are retained in `findings` for completeness but don't
    /// affect pass/fail status.
    pub fn from_findings(template_identifier: impl Into<String>, findings: Vec<TaggedEvaluation>) -> Self {
        let failed = findings.iter().filter(|f| !f.passed).count();
        let by_severity = |s: u8| findings.iter().filter(|f| !f.passed && f.severity == s).count();
        AnalysisReport {
            template_identifier: template_identifier.into(),
            summary: AnalysisSummary {
                total_evaluated: findings.len(),
                failed,
                severity_1_count: by_severity(1),
                severity_2_count: by_severity(2),
                severity_3_count: by_severity(3),
                severity_4_count: by_severity(4),
                passed: failed == 0,
            },
            findings,
        }
    }
}

/// Report generator over an [`AnalysisReport`].
pub struct Reporter;

impl Reporter {
    /// Serialize the report as pretty-printed JSON.
    pub fn to_json(report: &AnalysisReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Render a terminal-friendly summary, one line per failing finding.
    pub fn to_human_readable(report: &AnalysisReport) -> String {
        let mut output = String::new();

        output.push_str("=== ARM Template Analysis ===\n\n");
        output.push_str(&format!("Template: {}\n\n", report.template_identifier));

        output.push_str("--- Summary ---\n");
        output.push_str(&format!("Total evaluated: {}\n", report.summary.total_evaluated));
        output.push_str(&format!("Failed:          {}\n", report.summary.failed));
        output.push_str(&format!("  Severity 1:    {}\n", report.summary.severity_1_count));
        output.push_str(&format!("  Severity 2:    {}\n", report.summary.severity_2_count));
        output.push_str(&format!("  Severity 3:    {}\n", report.summary.severity_3_count));
        output.push_str(&format!("  Severity 4:    {}\n", report.summary.severity_4_count));
        output.push('\n');

        let status = if report.summary.passed { "PASSED" } else { "FAILED" };
        output.push_str(&format!("Status: {status}\n\n"));

        if report.summary.failed > 0 {
            output.push_str("--- Findings ---\n");
            for finding in &report.findings {
                if finding.passed {
                    continue;
                }
                let location = finding
                    .evaluation
                    .result
                    .as_ref()
                    .map(|r| format!("{}:{}", r.path, r.line_number_display()))
                    .unwrap_or_else(|| "<no path>".to_string());
                output.push_str(&format!("  [sev {}] {} - {} ({})\n", finding.severity, finding.rule_id, finding.description, location));
            }
            output.push('\n');
        }

        output
    }

    /// Render a GitHub Actions-flavored summary: a markdown table plus
    /// `::error`/`::warning` workflow command annotations for every failing
    /// finding (severity 1-2 as errors, 3-4 as warnings).
    pub fn to_ci_summary(report: &AnalysisReport) -> String {
        let mut output = String::new();

        output.push_str("## ARM Template Analysis\n\n");
        output.push_str(&format!("Template: `{}`\n\n", report.template_identifier));

        if report.summary.passed {
            output.push_str("**Status:** :white_check_mark: PASSED\n\n");
        } else {
            output.push_str("**Status:** :x: FAILED\n\n");
        }

        output.push_str("| Severity | Count |\n");
        output.push_str("|----------|-------|\n");
        output.push_str(&format!("| 1 | {} |\n", report.summary.severity_1_count));
        output.push_str(&format!("| 2 | {} |\n", report.summary.severity_2_count));
        output.push_str(&format!("| 3 | {} |\n", report.summary.severity_3_count));
        output.push_str(&format!("| 4 | {} |\n", report.summary.severity_4_count));
        output.push_str(&format!("| **Total failed** | **{}** |\n", report.summary.failed));
        output.push('\n');

        for finding in &report.findings {
            if finding.passed {
                continue;
            }
            let location = finding
                .evaluation
                .result
                .as_ref()
                .map(|r| format!("{}:{}", r.path, r.line_number_display()))
                .unwrap_or_else(|| "<no path>".to_string());
            let command = if finding.severity <= 2 { "error" } else { "warning" };
            output.push_str(&format!("::{command} ::[{}] {} ({})\n", finding.rule_id, finding.description, location));
        }

        output
    }
}
