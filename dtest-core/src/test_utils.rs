//! Shared test utilities for the dtest workspace
//!
//! Stand-ins for the external collaborators: a client that answers from the
//! filesystem the way a correctly behaving daemon would, and throwaway daemon
//! scripts. Only available when the "test-utils" feature is enabled.

use crate::client::{ClientConnector, MediaClient, QueueEntry};
use crate::config::{Assets, HarnessConfig};
use crate::error::{HarnessError, Result};
use crate::model::{SEPARATOR, nfc};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::os::unix::fs::PermissionsExt;

/// Daemon that logs its arguments and exits on SIGTERM.
pub const SLEEPING_DAEMON: &str = "echo \"started $*\" >&2\nexec sleep 600\n";

/// Daemon that ignores SIGTERM.
pub const STUBBORN_DAEMON: &str = "trap '' TERM\necho stubborn >&2\nwhile :; do sleep 1; done\n";

/// Write an executable `/bin/sh` script and return its path.
pub fn write_script(dir: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Write placeholder track and scratch files.
pub fn write_assets(dir: &Utf8Path) -> Assets {
    let sounds = dir.join("sounds");
    fs::create_dir_all(&sounds).unwrap();
    let track = sounds.join("slap.ogg");
    let scratch = sounds.join("scratch.ogg");
    fs::write(&track, b"OggS\0slap").unwrap();
    fs::write(&scratch, b"OggS\0scratch").unwrap();
    Assets { track, scratch }
}

/// A configuration rooted entirely inside `dir`, using a sleeping daemon.
pub fn harness_config(dir: &Utf8Path) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.general.test_root = dir.join("testroot");
    config.general.log_dir = dir.join("logs");
    config.general.source_dir = Some(dir.to_owned());
    config.daemon.binary = write_script(dir, "fake-daemon", SLEEPING_DAEMON);
    config.daemon.stop_timeout_secs = Some(10);
    config.client.poll_interval_ms = 5;
    config
}

/// Connects `SimulatedClient`s to the environment a configuration file lives in.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    pub user: String,
    /// `playing` calls a track stays current before it completes.
    pub play_polls: usize,
    /// When false, `version` fails as if the daemon never came up.
    pub accepts_connections: bool,
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self {
            user: "fred".to_owned(),
            play_polls: 2,
            accepts_connections: true,
        }
    }
}

impl ClientConnector for SimulatedConnector {
    fn connect(&self, config_path: &Utf8Path) -> Result<Box<dyn MediaClient>> {
        if !config_path.is_file() {
            return Err(HarnessError::Client(format!("no config at {config_path}")));
        }
        let root = config_path
            .parent()
            .ok_or_else(|| HarnessError::Client(format!("bad config path {config_path}")))?;
        let mut client = SimulatedClient::new(root.join("tracks"), &self.user, self.play_polls);
        client.accepts_connections = self.accepts_connections;
        Ok(Box::new(client))
    }
}

#[derive(Debug, Default)]
struct Playback {
    next_id: u32,
    queue: VecDeque<QueueEntry>,
    playing: Option<(QueueEntry, usize)>,
    recent: Vec<QueueEntry>,
}

/// Answers listings from disk, composing names to NFC, and simulates a
/// player that finishes each track after a fixed number of polls.
#[derive(Debug)]
pub struct SimulatedClient {
    tracks: Utf8PathBuf,
    user: String,
    play_polls: usize,
    accepts_connections: bool,
    playback: RefCell<Playback>,
}

impl SimulatedClient {
    pub fn new(tracks: impl Into<Utf8PathBuf>, user: &str, play_polls: usize) -> Self {
        Self {
            tracks: tracks.into(),
            user: user.to_owned(),
            play_polls,
            accepts_connections: true,
            playback: RefCell::new(Playback::default()),
        }
    }

    /// Map a canonical path onto the on-disk path, whatever its normalization.
    fn resolve(&self, dir: &str) -> Result<Utf8PathBuf> {
        let rest = dir
            .strip_prefix(self.tracks.as_str())
            .ok_or_else(|| HarnessError::Client(format!("{dir} is outside the collection")))?;

        let mut path = self.tracks.clone();
        for segment in rest.split(SEPARATOR).filter(|s| !s.is_empty()) {
            let entry = fs::read_dir(&path)?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .find(|name| nfc(name) == segment)
                .ok_or_else(|| HarnessError::Client(format!("no such directory {dir}")))?;
            path.push(entry);
        }
        Ok(path)
    }

    fn list(&self, dir: &str, want_dirs: bool) -> Result<Vec<String>> {
        let path = self.resolve(dir)?;
        let mut listing = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() != want_dirs {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                listing.push(format!("{dir}{SEPARATOR}{}", nfc(&name)));
            }
        }
        Ok(listing)
    }

    fn advance(&self) {
        let mut playback = self.playback.borrow_mut();
        if let Some((entry, polls)) = playback.playing.take() {
            if polls + 1 >= self.play_polls {
                let mut finished = entry;
                finished.state = Some("ok".to_owned());
                playback.recent.push(finished);
            } else {
                playback.playing = Some((entry, polls + 1));
            }
        }
        if playback.playing.is_none() {
            if let Some(mut next) = playback.queue.pop_front() {
                next.state = Some("started".to_owned());
                playback.playing = Some((next, 0));
            }
        }
    }
}

impl MediaClient for SimulatedClient {
    fn version(&self) -> Result<String> {
        if !self.accepts_connections {
            return Err(HarnessError::Client("connection refused".to_owned()));
        }
        Ok("simulated".to_owned())
    }

    fn directories(&self, dir: &str) -> Result<Vec<String>> {
        self.list(dir, true)
    }

    fn files(&self, dir: &str) -> Result<Vec<String>> {
        self.list(dir, false)
    }

    /// Case-insensitive substring match on the file name.
    fn files_matching(&self, dir: &str, regexp: &str) -> Result<Vec<String>> {
        let needle = regexp.to_lowercase();
        Ok(self
            .files(dir)?
            .into_iter()
            .filter(|path| {
                path.rsplit(SEPARATOR)
                    .next()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect())
    }

    fn play(&self, track: &str) -> Result<()> {
        let (dir, _) = track
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| HarnessError::Client(format!("bad track {track}")))?;
        if !self.files(dir)?.iter().any(|f| f == track) {
            return Err(HarnessError::Client(format!("no such track {track}")));
        }

        let mut playback = self.playback.borrow_mut();
        playback.next_id += 1;
        let entry = QueueEntry {
            track: track.to_owned(),
            id: Some(playback.next_id.to_string()),
            submitter: Some(self.user.clone()),
            state: Some("unplayed".to_owned()),
        };
        playback.queue.push_back(entry);
        Ok(())
    }

    fn queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.playback.borrow().queue.iter().cloned().collect())
    }

    fn playing(&self) -> Result<Option<QueueEntry>> {
        self.advance();
        Ok(self
            .playback
            .borrow()
            .playing
            .as_ref()
            .map(|(entry, _)| entry.clone()))
    }

    fn recent(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.playback.borrow().recent.clone())
    }
}
