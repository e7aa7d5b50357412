use super::start_and_connect;
use dtest_core::{Result, TestContext, TestUnit, check};

/// Length the daemon pads its queue to with random tracks.
const QUEUE_PAD: usize = 10;

/// Check the queue is padded to the (default) configured length.
pub struct Queue;

impl TestUnit for Queue {
    fn name(&self) -> &str {
        "queue"
    }

    fn test(&self, ctx: &mut TestContext<'_>) -> Result<()> {
        let client = start_and_connect(ctx)?;

        ctx.note("getting queue via client")?;
        let queue = client.queue()?;
        check!(
            queue.len() == QUEUE_PAD,
            "queue is at proper length (got {})",
            queue.len()
        );

        ctx.note("getting queue via the command-line client")?;
        let binary = ctx.config().client.binary.clone();
        let mut args = vec!["--config".to_owned(), ctx.env().config_path().to_string()];
        args.extend(ctx.config().client.extra_args.iter().cloned());
        args.push("queue".to_owned());
        let lines = ctx.command(&binary, &args)?;
        let tracks = lines.iter().filter(|l| l.starts_with("track")).count();
        check!(tracks == QUEUE_PAD, "queue is at proper length (got {tracks} via command)");
        Ok(())
    }
}
