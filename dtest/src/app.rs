use anyhow::{Context, Result};
use dtest_core::client::CliConnector;
use dtest_core::config::HarnessConfig;
use dtest_core::{Orchestrator, RunOutcome, RunResult, TestUnit, UnitRegistry};
use tracing::info;

/// Run the named units (all of them when `names` is empty), one fresh
/// environment each.
pub fn run(config: HarnessConfig, registry: &UnitRegistry, names: &[String]) -> Result<RunResult> {
    let units: Vec<&dyn TestUnit> = if names.is_empty() {
        registry.iter().collect()
    } else {
        registry.resolve(names)?
    };

    let connector = CliConnector::new(config.client.clone());
    let mut orchestrator = Orchestrator::new(config, Box::new(connector))
        .context("Failed to identify the test environment")?;

    for unit in units {
        let outcome = orchestrator
            .run(unit)
            .with_context(|| format!("Test unit {} aborted", unit.name()))?;
        match outcome {
            RunOutcome::Passed => info!("{}: passed", unit.name()),
            RunOutcome::Failed(message) => info!("{}: FAILED ({})", unit.name(), message),
        }
    }

    Ok(orchestrator.result())
}
