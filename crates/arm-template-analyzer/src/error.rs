//! Error Taxonomy
//!
//! Mirrors the fatal/recovered split in the analyzer's error handling design:
//! catalog and template parse failures are fatal and cross the engine
//! boundary; ARM expression evaluation failures are recovered locally and
//! replaced with a `NOT_PARSED` sentinel (see [`crate::armexpr`]).

use std::path::PathBuf;
use thiserror::Error;

/// Result type for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Fatal errors that cross the engine boundary.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// The rule catalog JSON is malformed, or a rule's expression failed to
    /// compile. Names the offending rule id when one could be identified.
    #[error("rule catalog error in rule `{rule_id}`: {message}")]
    CatalogParse {
        /// The id of the rule that failed to parse or compile, or `<unknown>`
        /// if the failure happened before an id could be read.
        rule_id: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The ARM template JSON is malformed or missing mandatory sections.
    #[error("template parse error: {0}")]
    TemplateParse(String),

    /// The parameters JSON is malformed or missing the `parameters` key.
    #[error("parameters parse error: {0}")]
    ParameterParse(String),

    /// The same expanded path was mapped to two different original paths.
    /// Indicates a bug in the template processor, not malformed input.
    #[error("resource mapping conflict: `{expanded_path}` maps to both `{first}` and `{second}`")]
    ResourceMappingConflict {
        /// The expanded path that received two distinct mappings.
        expanded_path: String,
        /// The first original path it was mapped to.
        first: String,
        /// The second, conflicting original path.
        second: String,
    },

    /// I/O failure reading a template, parameters, or rule catalog file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration value (inclusion/exclusion/override) referenced a rule
    /// id or severity that could not be applied consistently.
    #[error("configuration error: {0}")]
    Config(String),

    /// An ARM `[...]` language expression failed to parse or evaluate.
    /// Lenient mode never surfaces this - the offending node is replaced
    /// with `NOT_PARSED` instead; strict mode returns it to the caller.
    #[error("expression evaluation error: {0}")]
    ExpressionEvaluation(String),
}
