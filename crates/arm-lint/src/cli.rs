//! Command-line argument parsing and the top-level run loop.
//!
//! File discovery, configuration loading, and report formatting are the
//! thin glue the engine itself treats as an external collaborator - this
//! module is that glue, kept deliberately small.

use anyhow::{bail, Context, Result};
use arm_template_analyzer::armexpr::EvaluationMode;
use arm_template_analyzer::config::RuleFilterConfig;
use arm_template_analyzer::reporter::{AnalysisReport, Reporter};
use arm_template_analyzer::rules::{self, RuleDefinition};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Static analysis of ARM deployment templates against a rule catalog.
#[derive(Parser, Debug)]
#[command(name = "arm-lint")]
#[command(about = "Static analyzer for Azure Resource Manager (ARM) deployment templates")]
#[command(version)]
pub struct Cli {
    /// Path to the ARM template JSON file to analyze.
    #[arg(short, long)]
    pub template: PathBuf,

    /// Path to an ARM parameters JSON file (`{ "parameters": { name: { value | reference } } }`).
    #[arg(short, long)]
    pub parameters: Option<PathBuf>,

    /// Path to a rule catalog JSON file, or a directory of `*.json` rule
    /// catalog files to load and merge.
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Path to a rule filter configuration JSON file (inclusions/exclusions/severityOverrides).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Surface ARM expression evaluation failures as errors instead of
    /// substituting `NOT_PARSED` and continuing.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Human,
    Ci,
}

/// Parse CLI args, run the analysis, print the report, and return the
/// process exit code: `0` if the template passed every rule, `1` otherwise.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let raw_template = std::fs::read_to_string(&cli.template)
        .with_context(|| format!("reading template `{}`", cli.template.display()))?;
    let parameters_doc = cli
        .parameters
        .as_deref()
        .map(read_json)
        .transpose()
        .context("reading parameters file")?;

    let catalog = load_catalog(&cli.rules).context("loading rule catalog")?;
    let filter_config = cli
        .config
        .as_deref()
        .map(read_json)
        .transpose()
        .context("reading rule filter configuration")?
        .map(|v| serde_json::from_value::<RuleFilterConfig>(v).context("parsing rule filter configuration"))
        .transpose()?
        .unwrap_or_default();
    let catalog = rules::filter(&catalog, &filter_config);

    let mode = if cli.strict { EvaluationMode::Strict } else { EvaluationMode::Lenient };
    let template_identifier = cli.template.display().to_string();

    let findings = arm_template_analyzer::orchestrate::analyze_template(
        &raw_template,
        parameters_doc.as_ref(),
        &catalog,
        &template_identifier,
        mode,
    )?;

    let report = AnalysisReport::from_findings(template_identifier, findings);
    let rendered = match cli.format {
        OutputFormat::Json => Reporter::to_json(&report),
        OutputFormat::Human => Reporter::to_human_readable(&report),
        OutputFormat::Ci => Reporter::to_ci_summary(&report),
    };
    println!("{rendered}");

    Ok(if report.summary.passed { 0 } else { 1 })
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing JSON in `{}`", path.display()))
}

/// Load a rule catalog from either a single JSON file (an array of rule
/// objects) or a directory of such files, merged in directory-walk order.
fn load_catalog(path: &Path) -> Result<Vec<RuleDefinition>> {
    if path.is_dir() {
        let mut catalog = Vec::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking rule directory `{}`", path.display()))?;
            if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "json") {
                let raw = std::fs::read_to_string(entry.path())
                    .with_context(|| format!("reading rule file `{}`", entry.path().display()))?;
                catalog.extend(rules::load(&raw)?);
            }
        }
        if catalog.is_empty() {
            bail!("no `*.json` rule catalog files found under `{}`", path.display());
        }
        Ok(catalog)
    } else {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading rule catalog `{}`", path.display()))?;
        Ok(rules::load(&raw)?)
    }
}
