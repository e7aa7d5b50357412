//! Placeholder media tree generation.
//!
//! Files are written under the names callers give, byte for byte, while the
//! expectation model records their NFC form. Some standard fixture names are
//! deliberately decomposed so that verification exercises the daemon's own
//! normalization.

use crate::error::{HarnessError, Result};
use crate::model::{ExpectationModel, SEPARATOR};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::debug;

/// Standard fixture, in creation order.
///
/// Revision 1. Contains an NFC track (`F\u{cc}rst`), an NFD track
/// (`ThI\u{301}rd`), and one flat file in a single-level directory.
pub const STANDARD_TRACKS: &[&str] = &[
    // U+00CC LATIN CAPITAL LETTER I WITH GRAVE, precomposed
    "Joe Bloggs/First Album/01:F\u{cc}rst track.ogg",
    "Joe Bloggs/First Album/02:Second track.ogg",
    // I followed by U+0301 COMBINING ACUTE ACCENT; composes to U+00CD
    "Joe Bloggs/First Album/03:ThI\u{301}rd track.ogg",
    "Joe Bloggs/First Album/04:Fourth track.ogg",
    "Joe Bloggs/First Album/05:Fifth track.ogg",
    "Joe Bloggs/Second Album/01:First track.ogg",
    "Joe Bloggs/Second Album/02:Second track.ogg",
    "Joe Bloggs/Second Album/03:Third track.ogg",
    "Joe Bloggs/Second Album/04:Fourth track.ogg",
    "Joe Bloggs/Second Album/05:Fifth track.ogg",
    "Joe Bloggs/Third Album/01:First track.ogg",
    "Joe Bloggs/Third Album/02:Second track.ogg",
    "Joe Bloggs/Third Album/03:Third track.ogg",
    "Joe Bloggs/Third Album/04:Fourth track.ogg",
    "Joe Bloggs/Third Album/05:Fifth track.ogg",
    "Fred Smith/Boring/01:Dull.ogg",
    "Fred Smith/Boring/02:Tedious.ogg",
    "Fred Smith/Boring/03:Drum Solo.ogg",
    "Fred Smith/Boring/04:Yawn.ogg",
    "misc/blahblahblah.ogg",
    "Various/Greatest Hits/01:Jim Whatever - Spong.ogg",
    "Various/Greatest Hits/02:Joe Bloggs - Yadda.ogg",
];

/// Which tree a test unit starts with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Fixture {
    #[default]
    Standard,
    /// No tracks at all.
    Empty,
}

pub struct FixtureGenerator {
    tracks_dir: Utf8PathBuf,
    sample: Utf8PathBuf,
    model: ExpectationModel,
}

impl FixtureGenerator {
    /// `sample` is the audio file copied to every track.
    pub fn new(tracks_dir: impl Into<Utf8PathBuf>, sample: impl Into<Utf8PathBuf>) -> Self {
        let tracks_dir = tracks_dir.into();
        let model = ExpectationModel::new(tracks_dir.as_str());
        Self {
            tracks_dir,
            sample: sample.into(),
            model,
        }
    }

    pub fn tracks_dir(&self) -> &Utf8Path {
        &self.tracks_dir
    }

    pub fn model(&self) -> &ExpectationModel {
        &self.model
    }

    pub fn into_model(self) -> ExpectationModel {
        self.model
    }

    pub fn reset(&mut self) {
        self.model.clear();
    }

    /// Write a track at `relative` (segments separated by `/`) and record it.
    ///
    /// Returns the canonical path the daemon should report for it.
    pub fn create_track(&mut self, relative: &str) -> Result<String> {
        // Recorded first so a duplicate or malformed path never touches disk
        let path = self.model.insert_track(relative)?;
        let target = relative
            .split(SEPARATOR)
            .fold(self.tracks_dir.clone(), |path, segment| path.join(segment));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                HarnessError::Environment(format!("Failed to create {parent}: {e}"))
            })?;
        }
        fs::copy(&self.sample, &target).map_err(|e| {
            HarnessError::Environment(format!(
                "Failed to copy {} to {target}: {e}",
                self.sample
            ))
        })?;

        debug!("Created track {}", path);
        Ok(path)
    }

    pub fn populate(&mut self, fixture: Fixture) -> Result<()> {
        match fixture {
            Fixture::Standard => self.populate_standard(),
            Fixture::Empty => {
                self.reset();
                fs::create_dir_all(&self.tracks_dir).map_err(|e| {
                    HarnessError::Environment(format!("Failed to create {}: {e}", self.tracks_dir))
                })
            }
        }
    }

    pub fn populate_standard(&mut self) -> Result<()> {
        self.reset();
        for track in STANDARD_TRACKS {
            self.create_track(track)?;
        }
        debug!(
            "Standard fixture populated with {} tracks",
            self.model.track_count()
        );
        Ok(())
    }
}
