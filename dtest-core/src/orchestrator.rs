//! Runs test units, each against a freshly provisioned environment.
//!
//! A run goes through: environment reset, fixture population, the unit's
//! entry point, daemon stop, and accounting. The daemon is stopped whether
//! the unit passes, fails an assertion, returns another error, or panics.

use crate::client::{ClientConnector, MediaClient, run_command};
use crate::config::{Assets, HarnessConfig};
use crate::daemon_config::DaemonConfig;
use crate::environment::Environment;
use crate::error::{HarnessError, Result};
use crate::fixture::{Fixture, FixtureGenerator};
use crate::model::ExpectationModel;
use crate::process::{DaemonState, ProcessController};
use crate::runlog::RunLog;
use crate::verify;
use camino::Utf8Path;
use std::any::Any;
use std::ffi::OsStr;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A single test scenario.
pub trait TestUnit {
    /// Identity of the unit; also names its log file.
    fn name(&self) -> &str;

    fn fixture(&self) -> Fixture {
        Fixture::Standard
    }

    /// Entry point. Return `HarnessError::Assertion` (see `check!`) or panic
    /// to fail the run; any other error aborts it.
    fn test(&self, ctx: &mut TestContext<'_>) -> Result<()>;
}

/// Named units, in registration order.
#[derive(Default)]
pub struct UnitRegistry {
    units: Vec<Box<dyn TestUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit. Its name must be usable as a log file name and unique.
    pub fn register(&mut self, unit: Box<dyn TestUnit>) -> Result<&mut Self> {
        validate_unit_name(unit.name())?;
        if self.get(unit.name()).is_some() {
            return Err(HarnessError::Config(format!(
                "Test unit {} registered twice",
                unit.name()
            )));
        }
        self.units.push(unit);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&dyn TestUnit> {
        self.units
            .iter()
            .find(|unit| unit.name() == name)
            .map(|unit| unit.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|unit| unit.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TestUnit> {
        self.units.iter().map(|unit| unit.as_ref())
    }

    /// Resolve names to units, failing on the first unknown name.
    pub fn resolve<'a, S: AsRef<str>>(&'a self, names: &[S]) -> Result<Vec<&'a dyn TestUnit>> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref()).ok_or_else(|| {
                    HarnessError::Config(format!("Unknown test unit: {}", name.as_ref()))
                })
            })
            .collect()
    }
}

/// Unit names become `<log_dir>/<name>.log`, so they must be a single
/// plain path component.
pub fn validate_unit_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(HarnessError::Config(format!(
            "Invalid test unit name: {name:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed(String),
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }
}

/// Counters for one or more runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub tests_run: usize,
    pub failures: usize,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    pub fn merge(&mut self, other: RunResult) {
        self.tests_run += other.tests_run;
        self.failures += other.failures;
    }

    pub fn status(&self) -> &'static str {
        if self.passed() { "OK" } else { "FAILED" }
    }

    /// Print the final status line and return the process exit code.
    pub fn report(&self) -> ExitCode {
        println!(" {}", self.status());
        if self.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Everything a test unit may touch during its run.
pub struct TestContext<'a> {
    config: &'a HarnessConfig,
    env: &'a Environment,
    model: &'a ExpectationModel,
    daemon: &'a mut ProcessController,
    connector: &'a dyn ClientConnector,
    log: &'a mut RunLog,
}

impl<'a> TestContext<'a> {
    pub fn config(&self) -> &HarnessConfig {
        self.config
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    pub fn model(&self) -> &ExpectationModel {
        self.model
    }

    pub fn tracks_dir(&self) -> &Utf8Path {
        self.env.tracks_dir()
    }

    /// Canonical path of a fixture track, as the daemon reports it.
    pub fn track(&self, relative: &str) -> String {
        self.model.track_path(relative)
    }

    pub fn log_path(&self) -> &Utf8Path {
        self.log.path()
    }

    pub fn note(&mut self, message: &str) -> Result<()> {
        self.log.note(message)
    }

    pub fn start_daemon(&mut self) -> Result<()> {
        let stderr = self.log.daemon_stderr()?;
        self.daemon.start(&self.env.config_path(), stderr)
    }

    pub fn stop_daemon(&mut self) -> Result<()> {
        self.daemon.stop()
    }

    pub fn daemon(&mut self) -> &mut ProcessController {
        &mut *self.daemon
    }

    /// A client bound to this run's configuration file.
    pub fn client(&self) -> Result<Box<dyn MediaClient>> {
        self.connector.connect(&self.env.config_path())
    }

    pub fn verify_listing(&mut self, client: &dyn MediaClient) -> Result<usize> {
        verify::verify_listing(self.model, client, self.log)
    }

    /// Run an auxiliary program and return its output lines.
    pub fn command<I, S>(&mut self, program: &Utf8Path, args: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.log.note(&format!("running {program}"))?;
        run_command(program, args)
    }

    /// Like `poll_until`, but fails with `HarnessError::Process` as soon as
    /// the daemon is found to have exited while `done` does not yet hold.
    pub fn poll_daemon_until<F>(&mut self, what: &str, mut done: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let daemon = &mut *self.daemon;
        poll_until(self.config.poll_interval(), what, || {
            if done()? {
                return Ok(true);
            }
            match daemon.state() {
                DaemonState::Running => Ok(false),
                _ => Err(HarnessError::Process(format!(
                    "daemon exited while waiting for {what}"
                ))),
            }
        })
    }

    /// Re-evaluate `done` at the configured interval until it holds.
    pub fn poll_until<F>(&self, what: &str, done: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        poll_until(self.config.poll_interval(), what, done)
    }
}

/// Re-evaluate `done` every `interval` until it returns true or fails.
///
/// There is no deadline; a condition that never holds blocks forever.
pub fn poll_until<F>(interval: Duration, what: &str, mut done: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    while !done()? {
        debug!("Waiting for {}", what);
        std::thread::sleep(interval);
    }
    Ok(())
}

pub struct Orchestrator {
    config: HarnessConfig,
    env: Environment,
    assets: Assets,
    connector: Box<dyn ClientConnector>,
    daemon: ProcessController,
    result: RunResult,
}

impl Orchestrator {
    /// Build an orchestrator, locating the fixed assets from `config`.
    pub fn new(config: HarnessConfig, connector: Box<dyn ClientConnector>) -> Result<Self> {
        let assets = config.resolve_assets()?;
        Ok(Self::with_assets(config, assets, connector))
    }

    pub fn with_assets(
        config: HarnessConfig,
        assets: Assets,
        connector: Box<dyn ClientConnector>,
    ) -> Self {
        let scratch_extension = assets.scratch.extension().unwrap_or("ogg").to_owned();
        let env = Environment::new(config.general.test_root.clone())
            .with_scratch_extension(&scratch_extension);
        let daemon = ProcessController::new(config.daemon.binary.clone(), config.stop_policy());
        Self {
            config,
            env,
            assets,
            connector,
            daemon,
            result: RunResult::default(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn result(&self) -> RunResult {
        self.result
    }

    pub fn daemon(&mut self) -> &mut ProcessController {
        &mut self.daemon
    }

    pub fn log_dir(&self) -> &Utf8Path {
        &self.config.general.log_dir
    }

    /// Wipe the test root and write a fresh daemon configuration.
    pub fn reset_environment(&self) -> Result<()> {
        let daemon_config = DaemonConfig::for_environment(&self.env, &self.config);
        self.env.reset(&daemon_config, &self.assets)
    }

    /// Materialize `fixture` and return its expectation model.
    pub fn populate(&self, fixture: Fixture) -> Result<ExpectationModel> {
        let mut generator =
            FixtureGenerator::new(self.env.tracks_dir(), self.assets.track.clone());
        generator.populate(fixture)?;
        Ok(generator.into_model())
    }

    /// Run one unit. Assertion failures and panics are counted and reported
    /// as `RunOutcome::Failed`; other errors are counted and returned.
    pub fn run(&mut self, unit: &dyn TestUnit) -> Result<RunOutcome> {
        let name = unit.name().to_owned();
        info!("Running test unit {}", name);
        self.result.tests_run += 1;

        let prepared = self.prepare(unit);
        let (mut log, model) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.result.failures += 1;
                return Err(e);
            }
        };

        let mut ctx = TestContext {
            config: &self.config,
            env: &self.env,
            model: &model,
            daemon: &mut self.daemon,
            connector: self.connector.as_ref(),
            log: &mut log,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.test(&mut ctx)));

        let stopped = self.daemon.stop();

        let outcome = match outcome {
            Ok(Ok(())) => RunOutcome::Passed,
            Ok(Err(e)) if e.is_assertion() => RunOutcome::Failed(e.to_string()),
            Ok(Err(e)) => {
                error!("Test unit {} aborted: {}", name, e);
                self.result.failures += 1;
                if let Err(stop_err) = stopped {
                    error!("Failed to stop daemon: {}", stop_err);
                }
                if let Err(note_err) = log.note(&format!("aborted: {e}")) {
                    warn!("Failed to write run log: {}", note_err);
                }
                return Err(e);
            }
            Err(payload) => RunOutcome::Failed(panic_message(payload.as_ref())),
        };

        if let RunOutcome::Failed(message) = &outcome {
            error!("Test unit {} failed: {}", name, message);
            if let Err(note_err) = log.note(message) {
                warn!("Failed to write run log: {}", note_err);
            }
        }
        if let Err(stop_err) = &stopped {
            error!("Failed to stop daemon after {}: {}", name, stop_err);
        }
        settle(&mut self.result, outcome, stopped)
    }

    fn prepare(&self, unit: &dyn TestUnit) -> Result<(RunLog, ExpectationModel)> {
        validate_unit_name(unit.name())?;
        let log = RunLog::create(self.log_dir(), unit.name())?;
        self.reset_environment()?;
        let model = self.populate(unit.fixture())?;
        Ok((log, model))
    }

    /// Run units in order. Stops at the first unit that aborts.
    pub fn run_all<'u, I>(&mut self, units: I) -> Result<RunResult>
    where
        I: IntoIterator<Item = &'u dyn TestUnit>,
    {
        for unit in units {
            self.run(unit)?;
        }
        Ok(self.result)
    }
}

/// Count a run at most once as failed. A daemon that could not be stopped
/// aborts the run even when the unit itself passed.
fn settle(result: &mut RunResult, outcome: RunOutcome, stopped: Result<()>) -> Result<RunOutcome> {
    if !outcome.passed() || stopped.is_err() {
        result.failures += 1;
    }
    stopped.map(|()| outcome)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test unit panicked".to_owned()
    }
}
