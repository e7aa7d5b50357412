use super::start_and_connect;
use dtest_core::model::same_contents;
use dtest_core::{Result, TestContext, TestUnit, check};

/// Check that the file listing comes out right.
pub struct Files;

impl TestUnit for Files {
    fn name(&self) -> &str {
        "files"
    }

    fn test(&self, ctx: &mut TestContext<'_>) -> Result<()> {
        let client = start_and_connect(ctx)?;

        let mismatches = ctx.verify_listing(client.as_ref())?;
        check!(mismatches == 0, "{mismatches} directory listings differ");

        ctx.note("checking regexp file listing")?;
        let album = format!("{}/Joe Bloggs/First Album", ctx.tracks_dir());
        let found = client.files_matching(&album, "second")?;
        let expected = [ctx.track("Joe Bloggs/First Album/02:Second track.ogg")];
        check!(
            same_contents(&found, &expected),
            "expected {expected:?}, got {found:?}"
        );

        // "01:Fìrst track" must not match a plain "first"
        ctx.note("checking unicode regexp file listing")?;
        let found = client.files_matching(&album, "first")?;
        check!(found.is_empty(), "expected no match for 'first', got {found:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::orchestrator;
    use dtest_core::RunOutcome;

    #[test]
    fn test_files_unit_passes_against_normalizing_daemon() {
        let (_tmp, mut orchestrator) = orchestrator();
        assert_eq!(orchestrator.run(&Files).unwrap(), RunOutcome::Passed);
        assert!(!orchestrator.daemon().is_running());
    }
}
