//! # arm-lint
//!
//! Thin facade re-exporting [`arm_template_analyzer`] for convenience, plus
//! the CLI-level glue (file discovery, exit code mapping) that the engine
//! itself deliberately excludes.

pub mod cli;

pub use arm_template_analyzer::{
    armexpr, config, error, expr, lineno, ops, orchestrate, path, reporter, rules, runner,
    template, AnalysisReport, AnalyzerError, Reporter, Result, RuleDefinition, TaggedEvaluation,
};
