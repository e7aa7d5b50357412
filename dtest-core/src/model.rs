//! Expectation model: what the daemon should report for the fixture tree.
//!
//! Keys and members are full paths rooted at the tracks directory, joined
//! with `/`, with every segment below the root in Unicode normalization
//! form C. On-disk names may be decomposed; the model never is.

use crate::error::{HarnessError, Result};
use icu_normalizer::ComposingNormalizerBorrowed;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical path separator, independent of the host filesystem.
pub const SEPARATOR: char = '/';

/// Compose `text` to NFC.
pub fn nfc(text: &str) -> Cow<'_, str> {
    ComposingNormalizerBorrowed::new_nfc().normalize(text)
}

/// Whether `text` is already in NFC.
pub fn is_nfc(text: &str) -> bool {
    ComposingNormalizerBorrowed::new_nfc().is_normalized(text)
}

/// Order-independent comparison of two listings.
pub fn same_contents<A, B>(a: &[A], b: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut a: Vec<&str> = a.iter().map(AsRef::as_ref).collect();
    let mut b: Vec<&str> = b.iter().map(AsRef::as_ref).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpectationModel {
    root: String,
    dirs_by_parent: BTreeMap<String, BTreeSet<String>>,
    files_by_parent: BTreeMap<String, BTreeSet<String>>,
}

impl ExpectationModel {
    /// Create an empty model for a tracks directory.
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.len() > 1 && root.ends_with(SEPARATOR) {
            root.pop();
        }
        Self {
            root,
            dirs_by_parent: BTreeMap::new(),
            files_by_parent: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn clear(&mut self) {
        self.dirs_by_parent.clear();
        self.files_by_parent.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dirs_by_parent.is_empty() && self.files_by_parent.is_empty()
    }

    /// Full canonical path of a track given relative to the root.
    pub fn track_path(&self, relative: &str) -> String {
        format!("{}{SEPARATOR}{}", self.root, nfc(relative))
    }

    /// Record a track, and every ancestor directory below the root.
    ///
    /// Recording the same file twice is an error; directories shared with
    /// earlier tracks are expected and recorded once.
    pub fn insert_track(&mut self, relative: &str) -> Result<String> {
        let canonical = nfc(relative);
        let segments: Vec<&str> = canonical.split(SEPARATOR).collect();
        let Some((file, dirs)) = segments.split_last() else {
            return Err(HarnessError::InvalidState(format!(
                "empty track path {relative:?}"
            )));
        };
        if file.is_empty() || dirs.iter().any(|d| d.is_empty()) {
            return Err(HarnessError::InvalidState(format!(
                "malformed track path {relative:?}"
            )));
        }

        let mut parent = self.root.clone();
        for dir in dirs {
            let child = format!("{parent}{SEPARATOR}{dir}");
            self.dirs_by_parent
                .entry(parent)
                .or_default()
                .insert(child.clone());
            parent = child;
        }

        let path = format!("{parent}{SEPARATOR}{file}");
        if !self
            .files_by_parent
            .entry(parent)
            .or_default()
            .insert(path.clone())
        {
            return Err(HarnessError::DuplicateTrack(path));
        }
        Ok(path)
    }

    /// Drop a file from the model. Returns whether it was present.
    pub fn forget_file(&mut self, path: &str) -> bool {
        let Some((parent, _)) = path.rsplit_once(SEPARATOR) else {
            return false;
        };
        self.files_by_parent
            .get_mut(parent)
            .is_some_and(|files| files.remove(path))
    }

    pub fn dirs_by_parent(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.dirs_by_parent
    }

    pub fn files_by_parent(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.files_by_parent
    }

    pub fn directories(&self, parent: &str) -> Option<&BTreeSet<String>> {
        self.dirs_by_parent.get(parent)
    }

    pub fn files(&self, parent: &str) -> Option<&BTreeSet<String>> {
        self.files_by_parent.get(parent)
    }

    pub fn track_count(&self) -> usize {
        self.files_by_parent.values().map(BTreeSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_records_every_ancestor() {
        let mut model = ExpectationModel::new("/t/tracks");
        let path = model.insert_track("A/B/C/song.ogg").unwrap();
        assert_eq!(path, "/t/tracks/A/B/C/song.ogg");

        let dirs = model.dirs_by_parent();
        assert_eq!(dirs.len(), 3);
        assert!(dirs["/t/tracks"].contains("/t/tracks/A"));
        assert!(dirs["/t/tracks/A"].contains("/t/tracks/A/B"));
        assert!(dirs["/t/tracks/A/B"].contains("/t/tracks/A/B/C"));
        assert!(model.files("/t/tracks/A/B/C").unwrap().contains(&path));
    }

    #[test]
    fn test_flat_track_has_no_directory_entries() {
        let mut model = ExpectationModel::new("/t/tracks/");
        model.insert_track("loose.ogg").unwrap();
        assert!(model.dirs_by_parent().is_empty());
        assert_eq!(model.files("/t/tracks").unwrap().len(), 1);
    }

    #[test]
    fn test_shared_directories_recorded_once() {
        let mut model = ExpectationModel::new("/r");
        model.insert_track("Artist/Album/01.ogg").unwrap();
        model.insert_track("Artist/Album/02.ogg").unwrap();
        assert_eq!(model.directories("/r").unwrap().len(), 1);
        assert_eq!(model.directories("/r/Artist").unwrap().len(), 1);
        assert_eq!(model.track_count(), 2);
    }

    #[test]
    fn test_duplicate_track_fails_fast() {
        let mut model = ExpectationModel::new("/r");
        model.insert_track("a/b.ogg").unwrap();
        let err = model.insert_track("a/b.ogg").unwrap_err();
        assert!(matches!(err, HarnessError::DuplicateTrack(p) if p == "/r/a/b.ogg"));
    }

    #[test]
    fn test_decomposed_input_stored_composed() {
        let mut model = ExpectationModel::new("/r");
        let path = model.insert_track("Alb/03:ThI\u{301}rd track.ogg").unwrap();
        assert_eq!(path, "/r/Alb/03:Th\u{cd}rd track.ogg");
        assert!(is_nfc(&path));
    }

    #[test]
    fn test_normalization_collision_is_duplicate() {
        let mut model = ExpectationModel::new("/r");
        model.insert_track("x/\u{cd}.ogg").unwrap();
        assert!(model.insert_track("x/I\u{301}.ogg").is_err());
    }

    #[test]
    fn test_malformed_paths_rejected() {
        let mut model = ExpectationModel::new("/r");
        assert!(model.insert_track("").is_err());
        assert!(model.insert_track("a//b.ogg").is_err());
        assert!(model.insert_track("a/").is_err());
    }

    #[test]
    fn test_forget_file() {
        let mut model = ExpectationModel::new("/r");
        let path = model.insert_track("a/b.ogg").unwrap();
        assert!(model.forget_file(&path));
        assert!(!model.forget_file(&path));
        assert!(model.files("/r/a").unwrap().is_empty());
    }

    #[test]
    fn test_same_contents_ignores_order() {
        assert!(same_contents(&["b", "a"], &["a".to_string(), "b".to_string()]));
        assert!(!same_contents(&["a"], &["a", "b"]));
        assert!(!same_contents(&["a", "a"], &["a"]));
    }
}
