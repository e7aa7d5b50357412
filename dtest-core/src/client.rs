//! What the harness needs from a client of the daemon under test.

use crate::config::ClientSettings;
use crate::error::{HarnessError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::ffi::OsStr;
use std::process::{Command, Stdio};
use tracing::debug;

/// One entry of the queue, the recent list, or the playing track.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub track: String,
    pub id: Option<String>,
    pub submitter: Option<String>,
    /// Playback state as the daemon describes it, e.g. `unplayed`, `started`.
    pub state: Option<String>,
}

/// Client surface used by the verification engine and test units.
///
/// Implementations must tolerate being called repeatedly, e.g. when a test
/// unit polls `playing` until a track finishes.
pub trait MediaClient {
    fn version(&self) -> Result<String>;

    /// Child directories of `dir`, as full paths.
    fn directories(&self, dir: &str) -> Result<Vec<String>>;

    /// Files directly inside `dir`, as full paths.
    fn files(&self, dir: &str) -> Result<Vec<String>>;

    /// Files inside `dir` whose names match `regexp`.
    fn files_matching(&self, dir: &str, regexp: &str) -> Result<Vec<String>>;

    fn play(&self, track: &str) -> Result<()>;

    fn queue(&self) -> Result<Vec<QueueEntry>>;

    fn playing(&self) -> Result<Option<QueueEntry>>;

    fn recent(&self) -> Result<Vec<QueueEntry>>;
}

/// Creates clients bound to an explicit daemon configuration file.
pub trait ClientConnector {
    fn connect(&self, config_path: &Utf8Path) -> Result<Box<dyn MediaClient>>;
}

/// Run a program to completion and return its stdout split into lines.
pub fn run_command<I, S>(program: &Utf8Path, args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program.as_std_path())
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| HarnessError::Process(format!("Failed to run {program}: {e}")))?;

    if !output.status.success() {
        return Err(HarnessError::Client(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|e| HarnessError::Client(format!("{program} wrote invalid UTF-8: {e}")))?;
    Ok(stdout.lines().map(str::to_owned).collect())
}

/// Connector for the daemon's command-line client.
#[derive(Debug, Clone)]
pub struct CliConnector {
    settings: ClientSettings,
}

impl CliConnector {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl ClientConnector for CliConnector {
    fn connect(&self, config_path: &Utf8Path) -> Result<Box<dyn MediaClient>> {
        Ok(Box::new(CliClient {
            binary: self.settings.binary.clone(),
            config_path: config_path.to_owned(),
            extra_args: self.settings.extra_args.clone(),
        }))
    }
}

/// Runs `<binary> --config <path> <extra args> <command> ...` per call.
#[derive(Debug, Clone)]
pub struct CliClient {
    binary: Utf8PathBuf,
    config_path: Utf8PathBuf,
    extra_args: Vec<String>,
}

impl CliClient {
    fn run(&self, command: &[&str]) -> Result<Vec<String>> {
        debug!("Client command: {:?}", command);
        let mut args: Vec<&str> = vec!["--config", self.config_path.as_str()];
        args.extend(self.extra_args.iter().map(String::as_str));
        args.extend_from_slice(command);
        run_command(&self.binary, args)
    }
}

impl MediaClient for CliClient {
    fn version(&self) -> Result<String> {
        let lines = self.run(&["version"])?;
        lines
            .into_iter()
            .next()
            .ok_or_else(|| HarnessError::Client("empty version response".to_owned()))
    }

    fn directories(&self, dir: &str) -> Result<Vec<String>> {
        self.run(&["dirs", dir])
    }

    fn files(&self, dir: &str) -> Result<Vec<String>> {
        self.run(&["files", dir])
    }

    fn files_matching(&self, dir: &str, regexp: &str) -> Result<Vec<String>> {
        // The client marks regexp arguments with a leading '~'
        let pattern = format!("~{regexp}");
        self.run(&["files", dir, &pattern])
    }

    fn play(&self, track: &str) -> Result<()> {
        self.run(&["play", track]).map(|_| ())
    }

    fn queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(parse_queue(&self.run(&["queue"])?))
    }

    fn playing(&self) -> Result<Option<QueueEntry>> {
        let lines = self.run(&["playing"])?;
        if lines.first().is_some_and(|l| l == "nothing") {
            return Ok(None);
        }
        Ok(parse_queue(&lines).into_iter().next())
    }

    fn recent(&self) -> Result<Vec<QueueEntry>> {
        Ok(parse_queue(&self.run(&["recent"])?))
    }
}

/// Parse the client's queue listing.
///
/// Each entry starts with `track <path>` and continues with indented lines:
/// `id <id>`, `submitted by <user> at <time>`, and a state line.
pub fn parse_queue<S: AsRef<str>>(lines: &[S]) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = Vec::new();

    for line in lines.iter().map(AsRef::as_ref) {
        if let Some(track) = line.strip_prefix("track ") {
            entries.push(QueueEntry {
                track: track.to_owned(),
                ..QueueEntry::default()
            });
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            continue;
        };
        let detail = line.trim();
        if let Some(id) = detail.strip_prefix("id ") {
            entry.id = Some(id.to_owned());
        } else if let Some(rest) = detail.strip_prefix("submitted by ") {
            let user = rest.split_once(" at ").map_or(rest, |(user, _)| user);
            entry.submitter = Some(user.to_owned());
        } else if detail.starts_with("played at ") || detail.starts_with("might start at ") {
            // Timing details
        } else if let Some((_, state)) = detail.split_once(" so far") {
            // Progress shares a line with the state: "12s so far  started"
            let state = state.trim();
            if !state.is_empty() {
                entry.state = Some(state.to_owned());
            }
        } else if !detail.is_empty() && entry.state.is_none() {
            entry.state = Some(detail.to_owned());
        }
    }

    entries
}
