use crate::config::Assets;
use crate::daemon_config::DaemonConfig;
use crate::error::{HarnessError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Layout of one test root:
///
/// ```text
/// <root>/config
/// <root>/tracks/...
/// <root>/scratch.<ext>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    root: Utf8PathBuf,
    tracks: Utf8PathBuf,
    scratch_extension: String,
}

impl Environment {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        let tracks = root.join("tracks");
        Self {
            root,
            tracks,
            scratch_extension: "ogg".to_owned(),
        }
    }

    pub fn with_scratch_extension(mut self, extension: &str) -> Self {
        self.scratch_extension = extension.to_owned();
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn tracks_dir(&self) -> &Utf8Path {
        &self.tracks
    }

    pub fn config_path(&self) -> Utf8PathBuf {
        self.root.join("config")
    }

    pub fn scratch_path(&self) -> Utf8PathBuf {
        self.root.join(format!("scratch.{}", self.scratch_extension))
    }

    /// Wipe the root and rebuild it with a fresh daemon configuration.
    ///
    /// The tracks directory is left for the fixture generator to create.
    pub fn reset(&self, daemon_config: &DaemonConfig, assets: &Assets) -> Result<()> {
        info!("Resetting test root {}", self.root);

        remove_tree(self.root.as_std_path())
            .map_err(|e| HarnessError::Environment(format!("Failed to remove {}: {e}", self.root)))?;
        fs::create_dir_all(&self.root)
            .map_err(|e| HarnessError::Environment(format!("Failed to create {}: {e}", self.root)))?;

        let config_path = self.config_path();
        fs::write(&config_path, daemon_config.render()).map_err(|e| {
            HarnessError::Environment(format!("Failed to write {config_path}: {e}"))
        })?;

        let scratch = self.scratch_path();
        fs::copy(&assets.scratch, &scratch).map_err(|e| {
            HarnessError::Environment(format!(
                "Failed to copy {} to {scratch}: {e}",
                assets.scratch
            ))
        })?;

        debug!("Wrote {} and {}", config_path, scratch);
        Ok(())
    }
}

/// Recursively delete `path` if it exists. Symbolic links are removed, never
/// followed.
pub fn remove_tree(path: &Path) -> std::io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            remove_tree(&entry?.path())?;
        }
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_layout() {
        let env = Environment::new("/srv/testroot").with_scratch_extension("flac");
        assert_eq!(env.config_path(), "/srv/testroot/config");
        assert_eq!(env.tracks_dir(), "/srv/testroot/tracks");
        assert_eq!(env.scratch_path(), "/srv/testroot/scratch.flac");
    }

    #[test]
    fn test_remove_tree_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_tree(&dir.path().join("absent")).unwrap();
    }

    #[test]
    fn test_remove_tree_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let doomed = dir.path().join("doomed");
        fs::create_dir_all(doomed.join("nested")).unwrap();
        fs::write(doomed.join("nested/file"), b"x").unwrap();
        symlink(&outside, doomed.join("link")).unwrap();

        remove_tree(&doomed).unwrap();

        assert!(!doomed.exists());
        assert!(outside.join("keep.txt").exists());
    }

    #[test]
    fn test_remove_tree_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        remove_tree(&file).unwrap();
        assert!(!file.exists());
    }
}
