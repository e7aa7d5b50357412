//! Example test units run by the `dtest` binary.

use dtest_core::{MediaClient, Result, TestContext, UnitRegistry};

mod files;
mod play;
mod queue;
mod version;

pub fn registry() -> Result<UnitRegistry> {
    let mut registry = UnitRegistry::new();
    registry
        .register(Box::new(version::Version))?
        .register(Box::new(files::Files))?
        .register(Box::new(queue::Queue))?
        .register(Box::new(play::Play))?;
    Ok(registry)
}

/// Start the daemon and wait until it answers a client.
///
/// A daemon that exits before answering fails the run with a process error.
fn start_and_connect(ctx: &mut TestContext<'_>) -> Result<Box<dyn MediaClient>> {
    ctx.start_daemon()?;
    let client = ctx.client()?;
    ctx.poll_daemon_until("daemon to accept connections", || {
        Ok(client.version().is_ok())
    })?;
    Ok(client)
}


#[cfg(test)]
mod tests {
    use super::*;
    use dtest_core::HarnessError;
    use dtest_core::test_utils::SimulatedConnector;

    #[test]
    fn test_registry_contains_every_unit() {
        let registry = registry().unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["version", "files", "queue", "play"]
        );
    }

    #[test]
    fn test_daemon_dying_at_startup_aborts_the_run() {
        let connector = SimulatedConnector {
            accepts_connections: false,
            ..SimulatedConnector::default()
        };
        let (_tmp, mut orchestrator) =
            testing::orchestrator_with(Some("echo 'bad config' >&2\nexit 1\n"), connector);

        let err = orchestrator.run(&version::Version).unwrap_err();

        assert!(matches!(err, HarnessError::Process(_)), "got {err}");
        assert_eq!(orchestrator.result().failures, 1);
        assert!(!orchestrator.daemon().is_running());
    }
}
