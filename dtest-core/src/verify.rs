//! Compare the daemon's directory and file listings against the
//! expectation model.

use crate::client::MediaClient;
use crate::error::Result;
use crate::model::ExpectationModel;
use crate::runlog::RunLog;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Directories,
    Files,
}

impl ListingKind {
    fn as_str(self) -> &'static str {
        match self {
            ListingKind::Directories => "directories",
            ListingKind::Files => "files",
        }
    }
}

/// A directory whose reported listing disagrees with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMismatch {
    pub kind: ListingKind,
    pub directory: String,
    pub expected: BTreeSet<String>,
    pub actual: BTreeSet<String>,
}

impl ListingMismatch {
    pub fn missing(&self) -> impl Iterator<Item = &String> {
        self.expected.difference(&self.actual)
    }

    pub fn unexpected(&self) -> impl Iterator<Item = &String> {
        self.actual.difference(&self.expected)
    }
}

impl fmt::Display for ListingMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} mismatch for {}", self.kind.as_str(), self.directory)?;
        writeln!(f, "  expected: {:?}", self.expected)?;
        write!(f, "  actual:   {:?}", self.actual)
    }
}

/// Check every directory in the model, collecting all disagreements.
///
/// Listings are compared as sets. Client errors abort the comparison.
pub fn compare_listing(
    model: &ExpectationModel,
    client: &dyn MediaClient,
) -> Result<Vec<ListingMismatch>> {
    let mut mismatches = Vec::new();

    for (directory, expected) in model.dirs_by_parent() {
        let actual: BTreeSet<String> = client.directories(directory)?.into_iter().collect();
        if &actual != expected {
            mismatches.push(ListingMismatch {
                kind: ListingKind::Directories,
                directory: directory.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    for (directory, expected) in model.files_by_parent() {
        let actual: BTreeSet<String> = client.files(directory)?.into_iter().collect();
        if &actual != expected {
            mismatches.push(ListingMismatch {
                kind: ListingKind::Files,
                directory: directory.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    Ok(mismatches)
}

/// Compare listings and write each mismatch to the run log.
///
/// Returns the number of mismatches; zero means full agreement.
pub fn verify_listing(
    model: &ExpectationModel,
    client: &dyn MediaClient,
    log: &mut RunLog,
) -> Result<usize> {
    let mismatches = compare_listing(model, client)?;
    for mismatch in &mismatches {
        warn!("Listing mismatch in {}", mismatch.directory);
        log.note(&mismatch.to_string())?;
    }
    Ok(mismatches.len())
}
