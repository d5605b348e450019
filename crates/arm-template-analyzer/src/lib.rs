//! Static analysis engine for Azure Resource Manager (ARM) deployment
//! templates.
//!
//! Given a template (and optionally a parameters file) plus a rule catalog
//! authored in a declarative JSON DSL, this crate simulates ARM's
//! deployment-time template expansion, walks every resource against every
//! rule's boolean query expression, and reports a structured finding,
//! complete with the original source line number, for every resource path
//! that fails.
//!
//! The engine is purely static, deterministic, and side-effect free aside
//! from logging: it never deploys a template, contacts a cloud API, or
//! evaluates runtime state.
//!
//! # Pipeline
//!
//! ```ignore
//! use arm_template_analyzer::{armexpr::EvaluationMode, orchestrate, rules, config::RuleFilterConfig};
//!
//! let catalog = rules::load(&std::fs::read_to_string("rules.json")?)?;
//! let catalog = rules::filter(&catalog, &RuleFilterConfig::default());
//! let raw_template = std::fs::read_to_string("azuredeploy.json")?;
//! let findings = orchestrate::analyze_template(
//!     &raw_template, None, &catalog, "azuredeploy.json", EvaluationMode::Lenient,
//! )?;
//! # Ok::<(), arm_template_analyzer::error::AnalyzerError>(())
//! ```

pub mod armexpr;
pub mod config;
pub mod error;
pub mod expr;
pub mod lineno;
pub mod ops;
pub mod orchestrate;
pub mod path;
pub mod reporter;
pub mod rules;
pub mod runner;
pub mod template;

pub use error::{AnalyzerError, Result};
pub use orchestrate::{analyze_template, build_context, BicepCompiler, TemplateContext};
pub use reporter::{AnalysisReport, Reporter};
pub use rules::RuleDefinition;
pub use runner::TaggedEvaluation;
