//! Verification engine against a filesystem-backed client.

mod common;

use common::utf8_tempdir;
use dtest_core::client::{MediaClient, QueueEntry};
use dtest_core::fixture::FixtureGenerator;
use dtest_core::model::ExpectationModel;
use dtest_core::runlog::RunLog;
use dtest_core::test_utils::{SimulatedClient, write_assets};
use dtest_core::verify::{ListingKind, compare_listing, verify_listing};
use dtest_core::{HarnessError, Result};
use camino::Utf8PathBuf;
use std::collections::BTreeSet;
use std::fs;

fn standard_tree() -> (tempfile::TempDir, Utf8PathBuf, ExpectationModel) {
    let (tmp, dir) = utf8_tempdir();
    let assets = write_assets(&dir);
    let tracks = dir.join("tracks");
    let mut generator = FixtureGenerator::new(&tracks, assets.track);
    generator.populate_standard().unwrap();
    (tmp, tracks, generator.into_model())
}

/// Lists names exactly as stored on disk, without composing them.
struct RawClient;

impl RawClient {
    fn list(dir: &str, want_dirs: bool) -> Result<Vec<String>> {
        let mut listing = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() == want_dirs {
                listing.push(format!("{dir}/{}", entry.file_name().into_string().unwrap()));
            }
        }
        Ok(listing)
    }
}

impl MediaClient for RawClient {
    fn version(&self) -> Result<String> {
        Ok("raw".into())
    }
    fn directories(&self, dir: &str) -> Result<Vec<String>> {
        Self::list(dir, true)
    }
    fn files(&self, dir: &str) -> Result<Vec<String>> {
        Self::list(dir, false)
    }
    fn files_matching(&self, _dir: &str, _regexp: &str) -> Result<Vec<String>> {
        unimplemented!()
    }
    fn play(&self, _track: &str) -> Result<()> {
        unimplemented!()
    }
    fn queue(&self) -> Result<Vec<QueueEntry>> {
        unimplemented!()
    }
    fn playing(&self) -> Result<Option<QueueEntry>> {
        unimplemented!()
    }
    fn recent(&self) -> Result<Vec<QueueEntry>> {
        unimplemented!()
    }
}

/// A client whose connection has gone away.
struct BrokenClient;

impl MediaClient for BrokenClient {
    fn version(&self) -> Result<String> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn directories(&self, _dir: &str) -> Result<Vec<String>> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn files(&self, _dir: &str) -> Result<Vec<String>> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn files_matching(&self, _dir: &str, _regexp: &str) -> Result<Vec<String>> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn play(&self, _track: &str) -> Result<()> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn queue(&self) -> Result<Vec<QueueEntry>> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn playing(&self) -> Result<Option<QueueEntry>> {
        Err(HarnessError::Client("connection refused".into()))
    }
    fn recent(&self) -> Result<Vec<QueueEntry>> {
        Err(HarnessError::Client("connection refused".into()))
    }
}

#[test]
fn test_normalizing_client_matches_standard_fixture() {
    let (_tmp, tracks, model) = standard_tree();
    let client = SimulatedClient::new(&tracks, "fred", 1);

    let mismatches = compare_listing(&model, &client).unwrap();
    assert!(mismatches.is_empty(), "unexpected mismatches: {mismatches:#?}");
}

#[test]
fn test_boring_album_lists_four_files() {
    let (_tmp, tracks, model) = standard_tree();
    let client = SimulatedClient::new(&tracks, "fred", 1);
    let boring = format!("{tracks}/Fred Smith/Boring");

    let actual: BTreeSet<String> = client.files(&boring).unwrap().into_iter().collect();
    let expected: BTreeSet<String> = ["01:Dull", "02:Tedious", "03:Drum Solo", "04:Yawn"]
        .iter()
        .map(|name| format!("{boring}/{name}.ogg"))
        .collect();

    assert_eq!(&actual, model.files(&boring).unwrap());
    assert_eq!(actual, expected);
}

#[test]
fn test_forgotten_entry_yields_one_mismatch() {
    let (_tmp, tracks, mut model) = standard_tree();
    let client = SimulatedClient::new(&tracks, "fred", 1);
    let boring = format!("{tracks}/Fred Smith/Boring");

    assert!(model.forget_file(&format!("{boring}/02:Tedious.ogg")));
    let mismatches = compare_listing(&model, &client).unwrap();

    assert_eq!(mismatches.len(), 1);
    let mismatch = &mismatches[0];
    assert_eq!(mismatch.kind, ListingKind::Files);
    assert_eq!(mismatch.directory, boring);
    assert_eq!(
        mismatch.unexpected().collect::<Vec<_>>(),
        vec![&format!("{boring}/02:Tedious.ogg")]
    );
    assert_eq!(mismatch.missing().count(), 0);
}

#[test]
fn test_every_mismatch_reported() {
    let (_tmp, tracks, model) = standard_tree();
    fs::write(tracks.join("misc/stray.ogg"), b"x").unwrap();
    fs::create_dir(tracks.join("Various/Bonus Disc")).unwrap();
    fs::remove_file(tracks.join("Fred Smith/Boring/01:Dull.ogg")).unwrap();
    let client = SimulatedClient::new(&tracks, "fred", 1);

    let mismatches = compare_listing(&model, &client).unwrap();
    let directories: Vec<&str> = mismatches.iter().map(|m| m.directory.as_str()).collect();

    assert_eq!(mismatches.len(), 3);
    assert!(directories.contains(&format!("{tracks}/misc").as_str()));
    assert!(directories.contains(&format!("{tracks}/Various").as_str()));
    assert!(directories.contains(&format!("{tracks}/Fred Smith/Boring").as_str()));
}

#[test]
fn test_non_normalizing_client_is_caught() {
    let (_tmp, tracks, model) = standard_tree();

    let mismatches = compare_listing(&model, &RawClient).unwrap();

    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].directory, format!("{tracks}/Joe Bloggs/First Album"));
    let unexpected: Vec<_> = mismatches[0].unexpected().collect();
    assert_eq!(unexpected.len(), 1);
    assert!(unexpected[0].ends_with("03:ThI\u{301}rd track.ogg"));
}

#[test]
fn test_verify_listing_logs_and_counts() {
    let (tmp, tracks, mut model) = standard_tree();
    let client = SimulatedClient::new(&tracks, "fred", 1);
    let log_dir = Utf8PathBuf::try_from(tmp.path().join("logs")).unwrap();
    let mut log = RunLog::create(&log_dir, "verify").unwrap();

    assert_eq!(verify_listing(&model, &client, &mut log).unwrap(), 0);
    // Repeatable against the same model
    assert_eq!(verify_listing(&model, &client, &mut log).unwrap(), 0);

    model.forget_file(&format!("{tracks}/misc/blahblahblah.ogg"));
    assert_eq!(verify_listing(&model, &client, &mut log).unwrap(), 1);

    let content = fs::read_to_string(log.path()).unwrap();
    assert!(content.contains(&format!("files mismatch for {tracks}/misc")));
}

#[test]
fn test_client_errors_propagate() {
    let (_tmp, _tracks, model) = standard_tree();
    let err = compare_listing(&model, &BrokenClient).unwrap_err();
    assert!(matches!(err, HarnessError::Client(_)));
}
