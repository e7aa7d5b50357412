//! Helpers shared by the dtest-core integration tests.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tempfile::TempDir;

/// A temporary directory with a UTF-8 path. Keep the `TempDir` alive.
pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

/// Whether a process with this pid still exists (zombies count as gone once reaped).
pub fn pid_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Names of the entries directly inside `dir`, as stored on disk.
pub fn raw_names(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}
