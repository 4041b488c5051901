//! Suite orchestration command handler
//!
//! Loads a suite file, drives it against every declared server, renders the
//! report, and tells the caller whether the run was clean so the process
//! can exit non-zero on failures or unreachable servers.

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::suite::TestSuite;
use std::path::Path;

/// Execute a suite and print its report.
///
/// Returns `true` when every case passed and every server was reachable.
///
/// # Arguments
///
/// * `config` - Harness configuration (timeout, tolerance, validation).
/// * `suite_path` - Path to the YAML suite file.
/// * `json` - Emit the machine-readable JSON report instead of the
///   colored transcript.
///
/// # Errors
///
/// Returns an error if the suite cannot be loaded or the orchestrator
/// cannot be constructed. Case failures are not errors; they are part of
/// the report.
pub async fn run_suite(config: &Config, suite_path: &Path, json: bool) -> Result<bool> {
    let suite = TestSuite::load(suite_path)?;
    tracing::info!(suite = %suite.name, tests = suite.tests.len(), "loaded suite");
    if let Some(description) = &suite.description {
        tracing::info!(%description);
    }

    let orchestrator = Orchestrator::from_suite(&suite, config.orchestrator_options())?;
    let report = orchestrator.run(&suite).await;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_human());
    }

    Ok(report.all_passed())
}
