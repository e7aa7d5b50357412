use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io::Write;
use tracing::info;

/// Per-run diagnostics file shared by the harness and the daemon's stderr.
#[derive(Debug)]
pub struct RunLog {
    path: Utf8PathBuf,
    file: File,
}

impl RunLog {
    /// Create (or truncate) `<dir>/<name>.log`.
    pub fn create(dir: &Utf8Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.log"));
        File::create(&path)?;
        // Append mode so daemon output and our notes interleave rather than
        // overwrite each other.
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// A handle suitable for a child's standard error.
    pub fn daemon_stderr(&self) -> Result<File> {
        Ok(self.file.try_clone()?)
    }

    /// Append one diagnostic line, echoing it to the harness log.
    pub fn note(&mut self, message: &str) -> Result<()> {
        info!("{}", message);
        writeln!(self.file, "{message}")?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_truncates_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(dir.join("unit.log"), "stale\n").unwrap();

        let mut log = RunLog::create(dir, "unit").unwrap();
        log.note("fresh").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "fresh\n");
    }

    #[test]
    fn test_cloned_handle_appends() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let mut log = RunLog::create(dir, "unit").unwrap();

        log.note("one").unwrap();
        let mut stderr = log.daemon_stderr().unwrap();
        writeln!(stderr, "daemon says hi").unwrap();
        log.note("two").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "one\ndaemon says hi\ntwo\n");
    }
}
