//! `arm-lint` - static analysis of ARM deployment templates against a
//! declarative rule catalog.
//!
//! This binary is the thin CLI glue around [`arm_template_analyzer`]: it owns
//! argument parsing, rule/template/config file loading, logging setup, and
//! exit code mapping - everything the engine itself treats as an external
//! collaborator.

use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match arm_lint::cli::run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
