use super::start_and_connect;
use dtest_core::{QueueEntry, Result, TestContext, TestUnit, check};

const TRACK: &str = "Joe Bloggs/First Album/02:Second track.ogg";

/// Play a track and watch it move through the queue into the recent list.
pub struct Play;

fn submitted<'a>(entries: &'a [QueueEntry], track: &str) -> Vec<&'a QueueEntry> {
    entries
        .iter()
        .filter(|e| e.track == track && e.submitter.is_some())
        .collect()
}

impl TestUnit for Play {
    fn name(&self) -> &str {
        "play"
    }

    fn test(&self, ctx: &mut TestContext<'_>) -> Result<()> {
        let client = start_and_connect(ctx)?;
        let user = ctx.config().user.name.clone();
        let track = ctx.track(TRACK);

        ctx.note("adding track to queue")?;
        client.play(&track)?;

        ctx.note("checking track turned up in queue")?;
        let queue = client.queue()?;
        let queued = submitted(&queue, &track);
        check!(queued.len() == 1, "expected one queue entry, got {}", queued.len());
        check!(
            queued[0].submitter.as_deref() == Some(user.as_str()),
            "check queue submitter"
        );
        let id = queued[0].id.clone();

        ctx.note("waiting for track to play")?;
        ctx.poll_until("track to start", || {
            Ok(client.playing()?.is_some_and(|p| p.id == id))
        })?;
        ctx.note("waiting for track to finish")?;
        ctx.poll_until("track to finish", || {
            Ok(!client.playing()?.is_some_and(|p| p.id == id))
        })?;

        ctx.note("checking track turned up in recent list")?;
        let recent = client.recent()?;
        let played = submitted(&recent, &track);
        check!(played.len() == 1, "expected one recent entry, got {}", played.len());
        check!(
            played[0].submitter.as_deref() == Some(user.as_str()),
            "check recent entry submitter"
        );
        Ok(())
    }
}
