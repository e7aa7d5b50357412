use super::start_and_connect;
use dtest_core::{Result, TestContext, TestUnit, check};

/// Ask the daemon its version number.
pub struct Version;

impl TestUnit for Version {
    fn name(&self) -> &str {
        "version"
    }

    fn test(&self, ctx: &mut TestContext<'_>) -> Result<()> {
        let client = start_and_connect(ctx)?;
        let version = client.version()?;
        ctx.note(&format!("Server version: {version}"))?;
        check!(!version.trim().is_empty(), "daemon reported an empty version");
        Ok(())
    }
}
